use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid base64url string: {0}")]
    InvalidBase64(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid byte range: start {start} is past end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("invalid object path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}
