use thiserror::Error as ThisError;

use crate::error::{Error, ErrorKind};

/// The kinds of errors that can occur when parsing extended JSON into a document.
#[derive(Clone, Debug, ThisError)]
#[non_exhaustive]
pub enum JsonErrorKind {
    /// The text is not well-formed JSON.
    #[error("syntax error: {message}")]
    #[non_exhaustive]
    Syntax { message: String },

    /// The input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A well-formed token appeared where the document being built cannot accept it, e.g. a
    /// top-level value that is not an object.
    #[error("unexpected {found} {context}")]
    #[non_exhaustive]
    UnexpectedToken {
        found: &'static str,
        context: &'static str,
    },

    /// An extended JSON wrapper object was closed without one of the keys its type requires.
    #[error("missing {missing} in extended JSON {marker} object")]
    #[non_exhaustive]
    MissingKey {
        marker: &'static str,
        missing: &'static str,
    },

    /// An extended JSON wrapper object carried a payload of the wrong shape.
    #[error("invalid {marker} value: {message}")]
    #[non_exhaustive]
    InvalidValue {
        marker: &'static str,
        message: String,
    },

    /// A JSON number does not fit in a signed 64-bit integer.
    #[error("number {text} is out of range")]
    #[non_exhaustive]
    NumberOutOfRange { text: String },

    /// Non-whitespace content followed a complete document when only one was allowed.
    #[error("trailing content after document")]
    TrailingContent,
}

impl Error {
    pub(crate) fn json(kind: JsonErrorKind, offset: usize) -> Self {
        Error::from(ErrorKind::Json { kind }).with_offset(offset)
    }

    /// The JSON failure kind, if this error came from the JSON parser.
    pub fn json_kind(&self) -> Option<&JsonErrorKind> {
        match &self.kind {
            ErrorKind::Json { kind } => Some(kind),
            _ => None,
        }
    }
}
