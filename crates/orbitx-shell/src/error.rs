//! Error types for shell-integration parsing.

use thiserror::Error;

/// Failure to turn an announced cwd value into a path.
///
/// Never propagated past the parser: the offending sequence is logged and
/// skipped, later sequences in the same fragment are still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CwdDecodeError {
    #[error("empty cwd value")]
    Empty,

    #[error("malformed percent escape at byte {offset}")]
    MalformedEscape { offset: usize },

    #[error("percent-decoded value is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid file URL: {0}")]
    InvalidUrl(String),
}
