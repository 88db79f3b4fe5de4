//! Batch generation domain model.
//!
//! - [`job`] -- template descriptors, [`job::Job`], [`job::BatchRun`], normalization.
//! - [`outcome`] -- the per-job tri-state outcome.
//! - [`event`] -- unified progress events and the final summary.
//! - [`aggregator`] -- running counters and result list for one run.
//! - [`wire`] -- NDJSON encodings of events for the two client shapes.

pub mod aggregator;
pub mod event;
pub mod job;
pub mod outcome;
pub mod wire;

/// Maximum number of generation backend calls outstanding at once.
pub const MAX_CONCURRENT_GENERATIONS: usize = 5;

/// Message reported for every job when no backend credential is configured.
pub const MSG_BACKEND_UNAVAILABLE: &str =
    "Image generation is not configured (missing API credential)";
