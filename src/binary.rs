use std::fmt;

use crate::{
    base64,
    error::{Error, Result},
    raw::RawBinaryRef,
    spec::BinarySubtype,
};

/// An owned binary value: a subtype tag and the payload bytes.
///
/// For [`BinarySubtype::BinaryOld`] the payload excludes the inner length prefix the wire format
/// adds; appending writes it and reading strips it.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }

    /// Decodes standard, padded base64. A missing subtype means [`BinarySubtype::Generic`].
    ///
    /// ```rust
    /// use bson_core::{spec::BinarySubtype, Binary};
    ///
    /// let binary = Binary::from_base64("AAEC", None)?;
    /// assert_eq!(binary, Binary::new(BinarySubtype::Generic, [0, 1, 2]));
    /// assert_eq!(binary.to_base64(), "AAEC");
    /// # Ok::<(), bson_core::error::Error>(())
    /// ```
    pub fn from_base64(
        input: impl AsRef<str>,
        subtype: impl Into<Option<BinarySubtype>>,
    ) -> Result<Self> {
        let bytes = base64::decode(input.as_ref()).map_err(Error::malformed_value)?;
        Ok(Self::new(subtype.into().unwrap_or(BinarySubtype::Generic), bytes))
    }

    pub fn to_base64(&self) -> String {
        base64::encode(&self.bytes)
    }

    pub fn as_raw_binary(&self) -> RawBinaryRef<'_> {
        RawBinaryRef {
            subtype: self.subtype,
            bytes: &self.bytes,
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binary({:02x}, {})", u8::from(self.subtype), self.to_base64())
    }
}
