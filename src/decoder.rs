//! Percent-decoding of query string tokens.
//!
//! RQL reserves `& | ( ) = < >` and the comma, so any literal occurrence of
//! those characters (and of `:` inside values) must be percent-encoded.
//! Unlike form decoding, a literal `+` is meaningful in RQL values and is
//! preserved as-is; only `%2B` decodes to `+`, while `%20` still decodes to
//! a space.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// A failed percent-decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A `%` that is not followed by two hex digits.
    #[error("malformed percent sequence at byte {0}")]
    MalformedSequence(usize),

    /// The decoded bytes are not valid UTF-8.
    #[error("percent-decoded text is not valid UTF-8: '{0}'")]
    InvalidUtf8(String),
}

/// Percent-decodes a token of the query string.
///
/// Malformed sequences are a hard error rather than being passed through,
/// so a stray `%` in a value must itself be encoded as `%25`.
pub fn decode(text: &str) -> Result<Cow<'_, str>, DecodeError> {
    // the decoder itself passes malformed sequences through silently,
    // so validate them up front
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return Err(DecodeError::MalformedSequence(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(text)
        .decode_utf8()
        .map_err(|_| DecodeError::InvalidUtf8(text.to_string()))
}
