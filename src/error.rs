//! Surface error types of the reader.
//!
//! Parsing itself never raises: errors are collected into records (see
//! [`crate::parser::error`]). The reader entry points convert a collected
//! list into a [`ReadError`] when any record reaches the configured raise
//! level.

use thiserror::Error;

use crate::parser::error::ParseError;

/// Errors returned by the reader entry points.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The input bytes are not valid UTF-8.
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The input file could not be read.
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing collected at least one error at or above the raise level.
    /// The complete collected list is attached, in discovery order.
    #[error("parsing collected {} error(s) at or above the raise level{}", errors.len(),
        errors.first().map(|e| format!("; first: {e}")).unwrap_or_default())]
    Parse { errors: Vec<ParseError> },
}

impl ReadError {
    /// The collected parse errors, when parsing failed.
    pub fn parse_errors(&self) -> &[ParseError] {
        match self {
            ReadError::Parse { errors } => errors,
            _ => &[],
        }
    }
}
