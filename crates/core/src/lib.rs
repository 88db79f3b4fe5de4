//! Domain types for batch template generation.
//!
//! Everything in this crate is runtime-free: job normalization, the
//! per-job outcome model, the unified progress event model and its two
//! wire shapes, the result aggregator, and a line-delimited JSON decoder
//! for stream consumers.

pub mod batch;
pub mod error;
pub mod ndjson;
pub mod types;
