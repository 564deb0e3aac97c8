//! URL-safe transport encoding for signed messages.
//!
//! Signed messages contain separators and arbitrary payload characters, so they are
//! base64url encoded (without padding) before being put into query parameters.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// Encodes a message for transport in a URL.
#[must_use]
pub fn encode_url_token(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

/// Decodes a message produced by [`encode_url_token`].
///
/// Returns `None` for invalid base64 or non-UTF-8 content.
#[must_use]
pub fn decode_url_token(token: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(token.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}
