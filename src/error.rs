mod json;
mod oid;
mod validation;

use std::sync::Arc;

use thiserror::Error;

pub use json::JsonErrorKind;
pub use oid::ObjectIdErrorKind;
pub use validation::ValidationErrorKind;

use crate::spec::ElementType;

pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `bson-core` crate.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// The document key associated with the error, if any.
    pub key: Option<String>,

    /// The byte offset associated with the error, if any. For binary input this is the offset of
    /// the offending element within the outermost document; for JSON input it is the offset into
    /// the text.
    pub offset: Option<usize>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(key) = self.key.as_deref() {
            write!(f, "Error at key \"{key}\": ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(offset) = self.offset {
            write!(f, " (at byte offset {offset})")?;
        }
        Ok(())
    }
}

/// The types of errors that can occur in the `bson-core` crate.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed BSON bytes were encountered.
    #[error("Malformed BSON: {message}")]
    #[non_exhaustive]
    MalformedValue { message: String },

    /// Invalid UTF-8 bytes were encountered.
    #[error("Invalid UTF-8")]
    Utf8Encoding,

    /// A key contained an interior nul byte and cannot be encoded as a BSON cstring.
    #[error("Invalid key {key:?}: keys must not contain nul bytes")]
    #[non_exhaustive]
    InvalidKey { key: String },

    /// The operation would grow a document past the largest length representable in its
    /// signed 32-bit length prefix.
    #[error("Document would grow to {requested} bytes, exceeding the maximum BSON size")]
    #[non_exhaustive]
    TooLarge { requested: usize },

    /// The operation needed more room than a fixed-capacity buffer provides.
    #[error("Buffer of capacity {capacity} cannot hold {requested} bytes")]
    #[non_exhaustive]
    InsufficientCapacity { requested: usize, capacity: usize },

    /// The document is backed by memory it does not own and cannot be mutated.
    #[error("Document is read-only")]
    ReadOnly,

    /// The document has an open child document or array and cannot be mutated until the child
    /// is ended.
    #[error("Document is locked by an open child document")]
    Locked,

    /// A date string could not be parsed or a datetime could not be formatted.
    #[error("Invalid datetime: {message}")]
    #[non_exhaustive]
    DateTime { message: String },

    /// Nesting exceeded the maximum supported depth.
    #[error("Maximum nesting depth of {max} exceeded")]
    #[non_exhaustive]
    DepthExceeded { max: usize },

    /// An error related to the [`ObjectId`](crate::oid::ObjectId) type occurred.
    #[error("An ObjectId-related error occurred: {kind}")]
    #[non_exhaustive]
    ObjectId { kind: ObjectIdErrorKind },

    /// Extended JSON text could not be parsed into a document.
    #[error("Invalid JSON: {kind}")]
    #[non_exhaustive]
    Json { kind: JsonErrorKind },

    /// A document failed validation.
    #[error("Invalid document: {kind}")]
    #[non_exhaustive]
    Validation { kind: ValidationErrorKind },

    /// An error occurred when attempting to access a value in a document.
    #[error("An error occurred when attempting to access a document value: {kind}")]
    #[non_exhaustive]
    ValueAccess {
        /// The kind of error that occurred.
        kind: ValueAccessErrorKind,
    },

    /// A [`std::io::Error`] occurred. Shared so that errors stay cloneable.
    #[error("An IO error occurred: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            key: None,
            offset: None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        ErrorKind::Io(Arc::new(value)).into()
    }
}

/// The types of errors that can occur when attempting to access a value in a document.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ValueAccessErrorKind {
    /// No value for the specified key was present.
    #[error("The key was not present")]
    NotPresent,

    /// The type of the value in the document did not match the requested type.
    #[error("Expected type {expected:?}, got type {actual:?}")]
    #[non_exhaustive]
    UnexpectedType {
        /// The actual type of the value.
        actual: ElementType,

        /// The expected type of the value.
        expected: ElementType,
    },
}

impl Error {
    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn malformed_value(message: impl ToString) -> Self {
        ErrorKind::MalformedValue {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn too_large(requested: usize) -> Self {
        ErrorKind::TooLarge { requested }.into()
    }

    pub(crate) fn depth_exceeded() -> Self {
        ErrorKind::DepthExceeded {
            max: crate::raw::MAX_DEPTH,
        }
        .into()
    }

    pub(crate) fn datetime(error: impl ToString) -> Self {
        ErrorKind::DateTime {
            message: error.to_string(),
        }
        .into()
    }

    pub(crate) fn value_access_not_present() -> Self {
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::NotPresent,
        }
        .into()
    }

    pub(crate) fn value_access_unexpected_type(actual: ElementType, expected: ElementType) -> Self {
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::UnexpectedType { actual, expected },
        }
        .into()
    }

    /// Whether this error reports structurally corrupt BSON.
    pub fn is_malformed_value(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedValue { .. })
    }

    /// Whether this error reports a JSON parse failure.
    pub fn is_json(&self) -> bool {
        matches!(self.kind, ErrorKind::Json { .. })
    }
}
