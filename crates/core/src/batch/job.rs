//! Job normalization: loosely-typed template descriptors in, uniform
//! [`Job`] records out.
//!
//! Per-job defects (missing prompt, non-object entries) never fail the
//! request. They produce a job with an empty prompt so the orchestrator can
//! report an explicit error event for it.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Request-level validation message for an empty template list.
pub const MSG_TEMPLATES_REQUIRED: &str = "At least one template is required.";

/// Request-level validation message for a missing base image.
pub const MSG_BASE_IMAGE_REQUIRED: &str = "A base image is required.";

/// Prefix used when synthesizing ids for descriptors that carry none.
const SYNTHETIC_ID_PREFIX: &str = "template";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One template descriptor as sent by the client.
///
/// Every field is optional; resolution order is applied by
/// [`normalize_jobs`]. A text field holding a non-string value reads as
/// absent without affecting its siblings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    /// Explicit id. Clients send both strings and numbers.
    pub id: Option<serde_json::Value>,
    pub template_id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    /// Explicit prompt. Wins over `details`.
    #[serde(default, deserialize_with = "lenient_text")]
    pub prompt: Option<String>,
    /// Generic free-text field some template sources use for the prompt.
    #[serde(default, deserialize_with = "lenient_text")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reference_image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub model: Option<String>,
}

/// Accept any JSON value, keeping it only when it is a string.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// A canonical unit of generation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub display_name: String,
    /// Trimmed prompt. May be empty; such jobs settle as `EmptyInput`.
    pub prompt: String,
    pub model: String,
    pub reference_image_url: Option<String>,
    /// Zero-based index in the submitted template list.
    pub position: usize,
}

impl Job {
    /// Whether the job has no usable prompt.
    pub fn has_blank_prompt(&self) -> bool {
        self.prompt.trim().is_empty()
    }
}

/// Batch-wide inputs shared by every descriptor.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions<'a> {
    /// Request-level base image, used when a descriptor has no reference image.
    pub base_image_url: Option<&'a str>,
    /// Request-level model, used when a descriptor has no model.
    pub request_model: Option<&'a str>,
    /// Server default model, used when neither the descriptor nor the
    /// request picks one.
    pub default_model: &'a str,
    /// Whether the entry point refuses to run without a base image.
    pub require_base_image: bool,
}

/// One end-to-end execution of the orchestrator for one request.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub id: Uuid,
    pub started_at: Timestamp,
    pub jobs: Vec<Job>,
}

impl BatchRun {
    /// Create a run over a closed set of jobs.
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: chrono::Utc::now(),
            jobs,
        }
    }

    /// Number of jobs in the run. Fixed at creation.
    pub fn total(&self) -> usize {
        self.jobs.len()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Turn raw descriptors into [`Job`]s.
///
/// Fails only on request-level defects: an empty list, or a missing base
/// image when `options.require_base_image` is set.
pub fn normalize_jobs(
    raw: &[serde_json::Value],
    options: &NormalizeOptions<'_>,
) -> Result<Vec<Job>, CoreError> {
    if raw.is_empty() {
        return Err(CoreError::Validation(MSG_TEMPLATES_REQUIRED.to_string()));
    }

    let base_image = non_blank(options.base_image_url);
    if options.require_base_image && base_image.is_none() {
        return Err(CoreError::Validation(MSG_BASE_IMAGE_REQUIRED.to_string()));
    }

    let jobs = raw
        .iter()
        .enumerate()
        .map(|(position, value)| {
            // Non-object entries still become jobs.
            let descriptor = TemplateDescriptor::deserialize(value).unwrap_or_default();
            normalize_one(descriptor, position, base_image, options)
        })
        .collect();

    Ok(jobs)
}

fn normalize_one(
    descriptor: TemplateDescriptor,
    position: usize,
    base_image: Option<&str>,
    options: &NormalizeOptions<'_>,
) -> Job {
    let id = descriptor
        .id
        .as_ref()
        .and_then(id_to_string)
        .or_else(|| descriptor.template_id.as_ref().and_then(id_to_string))
        .unwrap_or_else(|| format!("{SYNTHETIC_ID_PREFIX}-{position}"));

    let display_name = first_non_blank([descriptor.name.as_deref(), descriptor.title.as_deref()])
        .map(str::to_string)
        .unwrap_or_else(|| format!("Template {}", position + 1));

    let prompt = first_non_blank([descriptor.prompt.as_deref(), descriptor.details.as_deref()])
        .unwrap_or_default()
        .to_string();

    let reference_image_url = first_non_blank([
        descriptor.reference_image_url.as_deref(),
        descriptor.image_url.as_deref(),
        base_image,
    ])
    .map(str::to_string);

    let model = first_non_blank([descriptor.model.as_deref(), options.request_model])
        .unwrap_or(options.default_model)
        .to_string();

    Job {
        id,
        display_name,
        prompt,
        model,
        reference_image_url,
        position,
    }
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => non_blank(Some(s)).map(str::to_string),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First candidate that is present and not whitespace-only, trimmed.
fn first_non_blank<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().find_map(non_blank)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
