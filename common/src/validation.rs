//! Validation of timestamped HMAC messages produced by [`crate::create_signed_message`].

use hmac::Mac as _;
use secrecy::{ExposeSecret as _, SecretString};

use crate::{FIELD_SEPARATOR, create_hmac, unix_time_seconds};

/// Outcome of validating a signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HmacValidationResult {
    /// Signature and timestamp check out; contains the issue time and the payload.
    Valid { issued_at: u64, payload: String },
    /// The signature is correct, but the timestamp is outside the allowed window.
    InvalidTimestamp,
    /// The signature does not match.
    InvalidHmac,
    /// The message does not have the `timestamp|payload|signature` shape.
    MalformedMessage,
}

/// Returns `true` if `timestamp` is no further than `allowed_window` seconds from now.
#[must_use]
pub fn is_timestamp_in_valid_range(timestamp: u64, allowed_window: u64) -> bool {
    unix_time_seconds().abs_diff(timestamp) <= allowed_window
}

/// Validates a message of the form `timestamp|payload|signature`.
///
/// The payload may contain the separator; the timestamp is everything before the
/// first separator and the signature everything after the last one.
/// The signature comparison runs in constant time.
#[must_use]
pub fn validate_hmac_message(
    data: &str,
    secret: &SecretString,
    allowed_window: u64,
) -> HmacValidationResult {
    let Some((message, signature)) = data.rsplit_once(FIELD_SEPARATOR) else {
        return HmacValidationResult::MalformedMessage;
    };
    let Some((timestamp, payload)) = message.split_once(FIELD_SEPARATOR) else {
        return HmacValidationResult::MalformedMessage;
    };
    let Ok(timestamp) = timestamp.parse::<u64>() else {
        return HmacValidationResult::MalformedMessage;
    };
    let Ok(signature) = hex::decode(signature) else {
        return HmacValidationResult::MalformedMessage;
    };

    let mac = create_hmac(message, secret.expose_secret().as_bytes());
    if mac.verify_slice(&signature).is_err() {
        return HmacValidationResult::InvalidHmac;
    }
    if !is_timestamp_in_valid_range(timestamp, allowed_window) {
        return HmacValidationResult::InvalidTimestamp;
    }
    HmacValidationResult::Valid {
        issued_at: timestamp,
        payload: payload.to_string(),
    }
}
