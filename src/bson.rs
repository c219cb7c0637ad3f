//! Small owned value types shared by the borrowed and owned BSON value representations.

use std::fmt::{self, Display};

use crate::{
    oid::ObjectId,
    raw::{RawDbPointerRef, RawRegexRef},
};

/// Represents a BSON timestamp value.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub struct Timestamp {
    /// The number of seconds since the Unix epoch.
    pub time: u32,

    /// An incrementing value to order timestamps with the same number of seconds in the `time`
    /// field.
    pub increment: u32,
}

impl Display for Timestamp {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Timestamp({}, {})", self.time, self.increment)
    }
}

impl Timestamp {
    /// The wire form: one little-endian u64 with `time` in the high 32 bits.
    pub(crate) fn to_le_bytes(self) -> [u8; 8] {
        let upper = (self.time as u64) << 32;
        let lower = self.increment as u64;

        (upper | lower).to_le_bytes()
    }

    pub(crate) fn from_le_bytes(bytes: [u8; 8]) -> Self {
        let ts = u64::from_le_bytes(bytes);

        Timestamp {
            time: (ts >> 32) as u32,
            increment: (ts & 0xFFFF_FFFF) as u32,
        }
    }
}

/// Represents a BSON regular expression value.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Regex {
    /// The regex pattern to match.
    pub pattern: String,

    /// The options for the regex.
    ///
    /// Options are identified by characters, which must be stored in
    /// alphabetical order. Valid options are 'i' for case insensitive matching, 'm' for
    /// multiline matching, 'x' for verbose mode, 'l' to make \w, \W, etc. locale dependent,
    /// 's' for dotall mode ('.' matches everything), and 'u' to make \w, \W, etc. match
    /// unicode.
    pub options: String,
}

impl Regex {
    /// Creates a new regex, sorting the option characters into alphabetical order.
    pub fn new(pattern: impl AsRef<str>, options: impl AsRef<str>) -> Self {
        let mut chars: Vec<_> = options.as_ref().chars().collect();
        chars.sort_unstable();
        let options: String = chars.into_iter().collect();
        Self {
            pattern: pattern.as_ref().to_string(),
            options,
        }
    }

    /// Borrow the contents as a [`RawRegexRef`].
    pub fn as_raw_regex(&self) -> RawRegexRef<'_> {
        RawRegexRef {
            pattern: &self.pattern,
            options: &self.options,
        }
    }
}

impl Display for Regex {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "/{}/{}", self.pattern, self.options)
    }
}

/// Represents a DBPointer. (Deprecated)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DbPointer {
    pub(crate) namespace: String,
    pub(crate) id: ObjectId,
}

impl DbPointer {
    /// Creates a pointer to the document with `id` in the collection `namespace`.
    pub fn new(namespace: impl Into<String>, id: ObjectId) -> Self {
        Self {
            namespace: namespace.into(),
            id,
        }
    }

    /// The namespace (collection name) the pointer refers to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The id of the referenced document.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Borrow the contents as a [`RawDbPointerRef`].
    pub fn as_raw_db_pointer(&self) -> RawDbPointerRef<'_> {
        RawDbPointerRef {
            namespace: &self.namespace,
            id: self.id,
        }
    }
}
