//! Validation modules

pub mod file;

pub use file::{validate_batch, validate_file, BatchDecision};
