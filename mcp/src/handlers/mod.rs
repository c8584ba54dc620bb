//! Tool handlers
//!
//! Implementations behind the built-in tools. Domain failures (division by
//! zero, a missing file) come back as ordinary text; only unexpected
//! problems are returned as errors.

pub mod demo_ops;
pub mod document_ops;
pub mod file_ops;
