//! Batch generation pipeline.
//!
//! - [`limiter`] -- bounds outstanding generation backend calls.
//! - [`emitter`] -- writes progress events onto the NDJSON response stream.
//! - [`sidecar`] -- best-effort persistence after a successful generation.
//! - [`orchestrator`] -- runs one batch end to end.

pub mod emitter;
pub mod limiter;
pub mod orchestrator;
pub mod sidecar;

pub use emitter::{NdjsonStream, ProgressEmitter};
pub use orchestrator::{BatchOrchestrator, BatchServices, OrchestratorOptions};
pub use sidecar::{PersistenceFailurePolicy, PersistenceSidecar, StoragePolicy};
