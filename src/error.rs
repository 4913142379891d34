//! Unified error types for bionic-reader
//!
//! Provides a top-level `ReaderError` that wraps module-specific errors,
//! plus `From` impls so `?` works across module boundaries.
//!
//! Annotation, stripping and progress computation never fail. Errors only
//! arise while parsing markup and at the persistence boundary, where the
//! position store logs and swallows them instead of propagating.

extern crate alloc;

use alloc::string::{String, ToString};
use core::fmt;

use crate::markup::MarkupError;

/// Top-level error type for bionic-reader operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReaderError {
    /// Markup could not be parsed into a tree
    Markup(MarkupError),
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
    /// Persisted state could not be encoded or decoded
    Serialize(String),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Markup(err) => write!(f, "Markup error: {}", err),
            ReaderError::Io(msg) => write!(f, "I/O error: {}", msg),
            ReaderError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ReaderError {}

impl From<MarkupError> for ReaderError {
    fn from(err: MarkupError) -> Self {
        ReaderError::Markup(err)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        ReaderError::Io(err.to_string())
    }
}

#[cfg(feature = "std")]
impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::Serialize(err.to_string())
    }
}
