//! Development mode: logins without an identity provider.
//!
//! A cluster with `dev_mode = true` redirects the login straight to its own callback
//! with [`MOCK_AUTHORIZATION_CODE`], and the callback synthesizes tokens instead of
//! exchanging the code. Nothing here is ever used for clusters without `dev_mode`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use kubegate_common::{generate_alphanumeric, unix_time_seconds};
use serde_json::json;

use crate::{config::Cluster, provider::TokenSet};

/// Authorization code accepted by dev mode clusters.
pub const MOCK_AUTHORIZATION_CODE: &str = "mock-dev-code";

const DEV_SUBJECT: &str = "dev-user";
const DEV_EMAIL: &str = "dev-user@example.com";
const DEV_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Synthesizes a token set for a dev mode login.
///
/// The ID token is an unsigned JWT carrying the usual claims, so it flows through
/// claims extraction and rendering like a real one.
#[must_use]
pub fn dev_mode_tokens(cluster: &Cluster, nonce: &str) -> TokenSet {
    let now = unix_time_seconds();
    let header = json!({"alg": "none", "typ": "JWT"});
    let claims = json!({
        "iss": cluster.issuer,
        "sub": DEV_SUBJECT,
        "aud": cluster.client_id,
        "email": DEV_EMAIL,
        "email_verified": true,
        "nonce": nonce,
        "iat": now,
        "exp": now + DEV_TOKEN_LIFETIME_SECS,
    });
    let id_token = format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    );
    TokenSet {
        id_token,
        refresh_token: Some(format!("dev-refresh-{}", generate_alphanumeric(24))),
        access_token: format!("dev-access-{}", generate_alphanumeric(24)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimsSet, derive_username};

    fn dev_cluster() -> Cluster {
        toml::from_str(
            r#"
            name = "dev"
            issuer = "https://dex.dev.local"
            client_id = "dev-client"
            redirect_uri = "http://127.0.0.1:5555/callback/dev"
            k8s_master_uri = "https://127.0.0.1:6443"
            dev_mode = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn synthesized_id_token_carries_claims() {
        let tokens = dev_mode_tokens(&dev_cluster(), "n0nce");
        let claims = ClaimsSet::from_id_token(&tokens.id_token).unwrap();
        assert_eq!(claims.get("iss").and_then(|v| v.as_str()), Some("https://dex.dev.local"));
        assert_eq!(claims.get("aud").and_then(|v| v.as_str()), Some("dev-client"));
        assert_eq!(claims.get("nonce").and_then(|v| v.as_str()), Some("n0nce"));
        assert_eq!(derive_username(&claims), "dev-user");
    }

    #[test]
    fn synthesized_tokens_are_not_empty() {
        let tokens = dev_mode_tokens(&dev_cluster(), "n0nce");
        assert!(!tokens.access_token.is_empty(), "access token is empty");
        assert!(
            tokens.refresh_token.is_some_and(|t| !t.is_empty()),
            "refresh token is empty"
        );
    }
}
