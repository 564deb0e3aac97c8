//! Self-verifying login state.
//!
//! The state parameter carries the cluster name and a nonce, signed together with its
//! issue time. The broker keeps no per-login storage: a callback is accepted if the
//! signature checks out, the token is not older than [`STATE_VALIDITY_SECS`] and it was
//! issued for the cluster the callback is handled for.
//!
//! A valid token can be replayed within its validity window. The identity provider
//! only accepts an authorization code once, which bounds the impact.

use kubegate_common::{
    FIELD_SEPARATOR, HmacValidationResult, create_signed_message, decode_url_token,
    encode_url_token, generate_alphanumeric, validate_hmac_message,
};
use secrecy::SecretString;

/// How long a login may take from redirect to callback.
pub const STATE_VALIDITY_SECS: u64 = 600;

const NONCE_LEN: usize = 32;

/// Why a state parameter was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state is malformed")]
    Malformed,
    #[error("state signature is invalid")]
    Forged,
    #[error("state has expired")]
    Expired,
}

/// A verified or freshly issued login state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    cluster: String,
    nonce: String,
    encoded: String,
}

impl StateToken {
    /// Issues a new state for a login to `cluster`, with a random nonce.
    #[must_use]
    pub fn issue(cluster: &str, secret: &SecretString) -> Self {
        let nonce = generate_alphanumeric(NONCE_LEN);
        let signed = create_signed_message(&format!("{cluster}{FIELD_SEPARATOR}{nonce}"), secret);
        Self {
            cluster: cluster.to_string(),
            nonce,
            encoded: encode_url_token(&signed),
        }
    }

    /// Verifies a state parameter received on the callback.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Malformed`] if the parameter cannot be decoded,
    /// [`StateError::Forged`] if the signature does not match and
    /// [`StateError::Expired`] if it is older than [`STATE_VALIDITY_SECS`].
    pub fn verify(token: &str, secret: &SecretString) -> Result<Self, StateError> {
        let signed = decode_url_token(token).ok_or(StateError::Malformed)?;
        match validate_hmac_message(&signed, secret, STATE_VALIDITY_SECS) {
            HmacValidationResult::Valid { payload, .. } => {
                let (cluster, nonce) = payload
                    .rsplit_once(FIELD_SEPARATOR)
                    .ok_or(StateError::Malformed)?;
                Ok(Self {
                    cluster: cluster.to_string(),
                    nonce: nonce.to_string(),
                    encoded: token.to_string(),
                })
            }
            HmacValidationResult::InvalidHmac => Err(StateError::Forged),
            HmacValidationResult::InvalidTimestamp => Err(StateError::Expired),
            HmacValidationResult::MalformedMessage => Err(StateError::Malformed),
        }
    }

    /// Cluster the login was started for.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Nonce the ID token must echo.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Wire form, as sent to the identity provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

#[cfg(test)]
mod tests {
    use kubegate_common::{create_signed_message_at, unix_time_seconds};

    use super::*;

    fn secret() -> SecretString {
        SecretString::from("state-secret")
    }

    #[test]
    fn issued_state_verifies() {
        let issued = StateToken::issue("prod", &secret());
        let verified = StateToken::verify(issued.as_str(), &secret()).unwrap();
        assert_eq!(verified, issued);
        assert_eq!(verified.cluster(), "prod");
        assert_eq!(verified.nonce().len(), NONCE_LEN);
    }

    #[test]
    fn states_are_unique() {
        let a = StateToken::issue("prod", &secret());
        let b = StateToken::issue("prod", &secret());
        assert_ne!(a.as_str(), b.as_str());
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn state_is_url_safe() {
        let issued = StateToken::issue("eu-west.1", &secret());
        assert!(
            issued
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state contains characters needing escaping: {}",
            issued.as_str()
        );
    }

    #[test]
    fn state_signed_with_other_secret_is_forged() {
        let issued = StateToken::issue("prod", &SecretString::from("other"));
        assert_eq!(
            StateToken::verify(issued.as_str(), &secret()),
            Err(StateError::Forged)
        );
    }

    #[test]
    fn cluster_cannot_be_swapped() {
        let issued = StateToken::issue("dev", &secret());
        let signed = decode_url_token(issued.as_str()).unwrap();
        let tampered = encode_url_token(&signed.replacen("|dev|", "|prod|", 1));
        assert_eq!(
            StateToken::verify(&tampered, &secret()),
            Err(StateError::Forged)
        );
    }

    #[test]
    fn old_state_is_expired() {
        let issued_at = unix_time_seconds() - STATE_VALIDITY_SECS - 60;
        let signed = create_signed_message_at(issued_at, "prod|nonce", &secret());
        assert_eq!(
            StateToken::verify(&encode_url_token(&signed), &secret()),
            Err(StateError::Expired)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        for token in ["", "!!!", "bm90IHNpZ25lZA"] {
            assert_eq!(
                StateToken::verify(token, &secret()),
                Err(StateError::Malformed),
                "token {token:?}"
            );
        }
    }
}
