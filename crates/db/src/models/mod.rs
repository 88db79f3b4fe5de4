//! Domain model structs and DTOs.

pub mod image_record;
