//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod image_record_repo;

pub use image_record_repo::ImageRecordRepo;
