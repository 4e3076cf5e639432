//! Base64 encoding of tag attribute values.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Decode an attribute value. `None` if the input is not Base64 or does not
/// decode to UTF-8 text.
pub fn decode(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Decode an attribute value, keeping the raw text when it does not decode.
pub fn decode_or_raw(encoded: &str) -> String {
    decode(encoded).unwrap_or_else(|| encoded.to_string())
}
