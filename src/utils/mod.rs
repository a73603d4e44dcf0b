//! Shared utilities.

pub mod binary;

pub use binary::{resolve_binary_path, resolve_responder, validate_binary, BinaryError, DEFAULT_RESPONDER};
