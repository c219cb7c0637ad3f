use thiserror::Error as ThisError;

use crate::error::{Error, ErrorKind};

/// The ways a structurally sound document can fail
/// [`RawDocument::validate`](crate::raw::RawDocument::validate).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[non_exhaustive]
pub enum ValidationErrorKind {
    /// A key or string value is not valid UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,

    /// A string value contains a nul byte.
    #[error("string contains a nul byte")]
    EmbeddedNull,

    /// A key begins with `$`.
    #[error("key begins with '$'")]
    DollarKey,

    /// A key contains `.`.
    #[error("key contains '.'")]
    DotKey,

    /// A `$ref` / `$id` / `$db` sequence is out of order or incomplete.
    #[error("malformed DBRef: {message}")]
    #[non_exhaustive]
    InvalidDbRef { message: &'static str },
}

impl Error {
    pub(crate) fn validation(kind: ValidationErrorKind, offset: usize) -> Self {
        Error::from(ErrorKind::Validation { kind }).with_offset(offset)
    }

    /// The validation failure kind, if this error came from document validation.
    pub fn validation_kind(&self) -> Option<&ValidationErrorKind> {
        match &self.kind {
            ErrorKind::Validation { kind } => Some(kind),
            _ => None,
        }
    }
}
