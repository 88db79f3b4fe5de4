//! Client side of the external image-generation backend.
//!
//! - [`backend`] -- the [`backend::GenerationBackend`] trait and its request/response types.
//! - [`api`] -- HTTP implementation of the backend over [`reqwest`].
//! - [`invoker`] -- one backend call per job, mapped to a [`batchgen_core::batch::outcome::JobOutcome`].

pub mod api;
pub mod backend;
pub mod invoker;
