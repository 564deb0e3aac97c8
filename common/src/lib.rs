//! Common utilities for signed, self-verifying tokens.
//!
//! This crate provides:
//! - Timestamped HMAC message signing and validation
//! - URL-safe transport encoding for signed messages
//! - Random secret and nonce generation
#![expect(
    clippy::missing_errors_doc,
    reason = "The situation it maps to errors should be obvious."
)]

mod secrets;
mod signing;
mod url_token;
mod validation;

pub use secrets::*;
pub use signing::*;
pub use url_token::*;
pub use validation::*;
