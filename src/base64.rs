use base64::{DecodeError, Engine, engine::general_purpose::STANDARD};

pub(crate) fn decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(input)
}

pub(crate) fn encode<T: AsRef<[u8]>>(input: T) -> String {
    STANDARD.encode(input)
}

/// Appends the padded base64 form of `input` to `out` without an intermediate allocation.
pub(crate) fn encode_into<T: AsRef<[u8]>>(input: T, out: &mut String) {
    STANDARD.encode_string(input, out)
}
