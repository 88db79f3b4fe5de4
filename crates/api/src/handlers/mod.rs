//! Request handlers.

pub mod batch_generate;
