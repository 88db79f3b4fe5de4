//! Wire adapters: [`BatchEvent`] to newline-terminated JSON.
//!
//! Two client generations consume the stream. The preview client keys
//! progress by `templateId` and expects a `complete` event carrying the
//! results; the collection client keys progress by submission `index` and
//! expects `start`/`done` count events.

use serde::Serialize;

use super::event::{BatchEvent, BatchResult};
use super::outcome::JobOutcome;

pub const STATUS_GENERATING: &str = "generating";
pub const STATUS_DONE: &str = "done";
pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// Which terminal/progress vocabulary a stream speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// `progress` by `templateId`, terminal `complete{results}`.
    Preview,
    /// `start`, `progress` by `index`, terminal `done{counts}`.
    Collection,
}

impl WireShape {
    /// Encode one event as a single NDJSON line (trailing `\n` included).
    ///
    /// Returns `Ok(None)` for events this shape does not carry.
    pub fn encode_line(self, event: &BatchEvent<'_>) -> Result<Option<String>, serde_json::Error> {
        let encoded = match self {
            WireShape::Preview => preview_event(event).map(|e| serde_json::to_string(&e)),
            WireShape::Collection => collection_event(event).map(|e| serde_json::to_string(&e)),
        };
        let Some(mut line) = encoded.transpose()? else {
            return Ok(None);
        };
        line.push('\n');
        Ok(Some(line))
    }
}

// ---------------------------------------------------------------------------
// Preview shape
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PreviewEvent<'a> {
    Progress(PreviewProgress<'a>),
    Complete { results: Vec<PreviewResult<'a>> },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewProgress<'a> {
    template_id: &'a str,
    template_name: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<usize>,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewResult<'a> {
    template_id: &'a str,
    template_name: &'a str,
    image_url: &'a str,
    prompt: &'a str,
    model: &'a str,
    saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_record_id: Option<&'a str>,
}

impl<'a> From<&'a BatchResult> for PreviewResult<'a> {
    fn from(r: &'a BatchResult) -> Self {
        Self {
            template_id: &r.template_id,
            template_name: &r.template_name,
            image_url: &r.image_url,
            prompt: &r.prompt,
            model: &r.model,
            saved: r.saved,
            image_record_id: r.image_record_id.as_deref(),
        }
    }
}

fn preview_event<'a>(event: &BatchEvent<'a>) -> Option<PreviewEvent<'a>> {
    match *event {
        BatchEvent::Started { .. } => None,
        BatchEvent::JobStarted { job, total } => Some(PreviewEvent::Progress(PreviewProgress {
            template_id: &job.id,
            template_name: &job.display_name,
            status: STATUS_GENERATING,
            current: None,
            total,
            image_url: None,
            saved: None,
            error: None,
        })),
        BatchEvent::JobSettled {
            job,
            outcome,
            progress,
        } => {
            let (status, image_url, saved) = match outcome {
                JobOutcome::Ok(image) => (STATUS_DONE, Some(image.output_url.as_str()), Some(image.persisted)),
                _ => (STATUS_ERROR, None, None),
            };
            Some(PreviewEvent::Progress(PreviewProgress {
                template_id: &job.id,
                template_name: &job.display_name,
                status,
                current: Some(progress.current),
                total: progress.total,
                image_url,
                saved,
                error: outcome.error_message(),
            }))
        }
        BatchEvent::Finished { summary } => Some(PreviewEvent::Complete {
            results: summary.results.iter().map(PreviewResult::from).collect(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Collection shape
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum CollectionEvent<'a> {
    Start { total: usize },
    Progress(CollectionProgress<'a>),
    Done {
        completed: usize,
        succeeded: usize,
        failed: usize,
    },
}

#[derive(Serialize)]
struct CollectionProgress<'a> {
    index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

fn collection_event<'a>(event: &BatchEvent<'a>) -> Option<CollectionEvent<'a>> {
    match *event {
        BatchEvent::Started { total } => Some(CollectionEvent::Start { total }),
        BatchEvent::JobStarted { job, .. } => Some(CollectionEvent::Progress(CollectionProgress {
            index: job.position,
            status: STATUS_GENERATING,
            current: None,
            total: None,
            url: None,
            error: None,
        })),
        BatchEvent::JobSettled {
            job,
            outcome,
            progress,
        } => {
            let (status, url) = match outcome {
                JobOutcome::Ok(image) => (STATUS_OK, Some(image.output_url.as_str())),
                _ => (STATUS_ERROR, None),
            };
            Some(CollectionEvent::Progress(CollectionProgress {
                index: job.position,
                status,
                current: Some(progress.current),
                total: Some(progress.total),
                url,
                error: outcome.error_message(),
            }))
        }
        BatchEvent::Finished { summary } => Some(CollectionEvent::Done {
            completed: summary.counters.completed,
            succeeded: summary.counters.succeeded,
            failed: summary.counters.failed,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
