//! Secret generation utilities.
//!
//! This module provides functions for generating random secrets suitable for
//! use as HMAC keys, and shorter random nonces.

use rand::{Rng as _, distr::Alphanumeric};

/// Generates a random secret string suitable for use as an HMAC key.
///
/// Returns a 32-character alphanumeric string.
#[must_use]
pub fn generate_secret() -> String {
    generate_alphanumeric(32)
}

/// Generates a random alphanumeric string of `len` characters.
#[must_use]
pub fn generate_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
