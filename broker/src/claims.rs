//! ID token claims and the username derived from them.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Username used when the claims carry no usable email.
pub const DEFAULT_USERNAME: &str = "user";

/// Claims of an ID token, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimsSet(Map<String, Value>);

impl ClaimsSet {
    /// Reads the payload segment of a compact JWT.
    ///
    /// The signature is not checked here, callers pass tokens that were already verified
    /// (or synthesized in dev mode).
    #[must_use]
    pub fn from_id_token(raw: &str) -> Option<Self> {
        let mut segments = raw.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(_header), Some(payload)) => payload,
            _ => return None,
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `email` claim, if it is a string.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get("email").and_then(Value::as_str)
    }

    /// Indented JSON rendering for display.
    #[must_use]
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for ClaimsSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Username for kubeconfig entries: the local part of the email claim.
///
/// Falls back to [`DEFAULT_USERNAME`] when the claim is missing, not a string or empty.
#[must_use]
pub fn derive_username(claims: &ClaimsSet) -> String {
    claims
        .email()
        .filter(|email| !email.is_empty())
        .and_then(|email| email.split('@').next())
        .unwrap_or(DEFAULT_USERNAME)
        .to_string()
}
