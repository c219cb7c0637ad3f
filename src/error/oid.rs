use hex::FromHexError;
use thiserror::Error as ThisError;

use crate::error::{Error, ErrorKind};

/// Why a string could not be parsed as an [`ObjectId`](crate::oid::ObjectId).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[non_exhaustive]
pub enum ObjectIdErrorKind {
    /// The character at `index` is not a hex digit.
    #[error("invalid character {c:?} at index {index}")]
    #[non_exhaustive]
    InvalidCharacter { c: char, index: usize },

    /// The string is not 24 characters long.
    #[error("expected 24 hex characters, got {length}")]
    #[non_exhaustive]
    InvalidLength { length: usize },
}

impl Error {
    pub(crate) fn object_id(kind: ObjectIdErrorKind) -> Self {
        ErrorKind::ObjectId { kind }.into()
    }

    /// Maps a decoding failure of a string of `length` bytes.
    pub(crate) fn from_hex_error(error: FromHexError, length: usize) -> Self {
        Self::object_id(match error {
            FromHexError::InvalidHexCharacter { c, index } => {
                ObjectIdErrorKind::InvalidCharacter { c, index }
            }
            FromHexError::InvalidStringLength | FromHexError::OddLength => {
                ObjectIdErrorKind::InvalidLength { length }
            }
        })
    }

    /// The object id parse failure, if this error came from [`ObjectId::parse_str`](crate::oid::ObjectId::parse_str).
    pub fn object_id_kind(&self) -> Option<&ObjectIdErrorKind> {
        match &self.kind {
            ErrorKind::ObjectId { kind } => Some(kind),
            _ => None,
        }
    }
}
