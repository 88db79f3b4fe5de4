//! Durable storage and downstream media services.
//!
//! - [`storage`] -- the [`storage::ObjectStore`] trait and its S3 implementation.
//! - [`thumbnail`] -- thumbnail requests, including the fire-and-forget trigger.

pub mod storage;
pub mod thumbnail;
