//! Unified internal progress event model.
//!
//! The orchestrator only ever produces [`BatchEvent`]s. Turning them into
//! bytes for a particular client is the job of [`super::wire`].

use serde::Serialize;

use super::job::Job;
use super::outcome::JobOutcome;

/// Counters for one run. Monotonically non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunningCounters {
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Position of a settlement within the run, taken at the moment it was
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Jobs settled so far, this one included.
    pub current: usize,
    pub total: usize,
}

/// One successful job in the final result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub template_id: String,
    pub template_name: String,
    pub image_url: String,
    pub prompt: String,
    pub model: String,
    pub saved: bool,
    pub image_record_id: Option<String>,
    pub position: usize,
}

/// Reconciled outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub counters: RunningCounters,
    pub results: Vec<BatchResult>,
}

/// Everything the orchestrator reports while a run is in flight.
#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'a> {
    /// The run has started. Emitted once, before any job event.
    Started { total: usize },
    /// A job acquired a generation slot and is about to call the backend.
    JobStarted { job: &'a Job, total: usize },
    /// A job produced its outcome.
    JobSettled {
        job: &'a Job,
        outcome: &'a JobOutcome,
        progress: ProgressSnapshot,
    },
    /// Terminal event. Always last, always exactly once.
    Finished { summary: &'a BatchSummary },
}
