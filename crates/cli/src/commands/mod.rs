//! CLI command implementations.

pub mod courses;
