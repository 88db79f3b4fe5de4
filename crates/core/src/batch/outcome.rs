//! Per-job outcome produced exactly once for every job in a run.

/// Fallback reason when the backend fails without saying why.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Reason attached to jobs whose prompt resolved to nothing.
pub const EMPTY_PROMPT_REASON: &str = "Template has no prompt";

/// A successfully generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Final image URL: the durable copy when uploaded, else the backend URL.
    pub output_url: String,
    /// Whether the metadata record was written.
    pub persisted: bool,
    /// Id of the written record, if any.
    pub record_id: Option<String>,
}

impl GeneratedImage {
    /// A freshly rendered, not yet persisted image.
    pub fn rendered(output_url: impl Into<String>) -> Self {
        Self {
            output_url: output_url.into(),
            persisted: false,
            record_id: None,
        }
    }
}

/// Result of running one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ok(GeneratedImage),
    /// The job never reached the backend because its input was unusable.
    EmptyInput { reason: String },
    Failed { message: String },
}

impl JobOutcome {
    pub fn empty_prompt() -> Self {
        JobOutcome::EmptyInput {
            reason: EMPTY_PROMPT_REASON.to_string(),
        }
    }

    /// Build a failure, substituting [`UNKNOWN_ERROR`] for a blank message.
    pub fn failed(message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_ERROR);
        JobOutcome::Failed {
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Ok(_))
    }

    /// Human-readable error text for non-success outcomes.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobOutcome::Ok(_) => None,
            JobOutcome::EmptyInput { reason } => Some(reason),
            JobOutcome::Failed { message } => Some(message),
        }
    }
}
