//! OpenID Connect provider adapter.
//!
//! Wraps discovery, authorization URL construction, code exchange and ID token
//! verification for one cluster. A [`Provider`] lives for a single request; it is
//! rebuilt from the cluster config and the freshly resolved trust material every time.

use oauth2_reqwest::ReqwestClient;
use openidconnect::{
    AuthUrl, AuthorizationCode, ClaimsVerificationError, ClientId, ClientSecret, CsrfToken,
    EndpointMaybeSet, EndpointNotSet, EndpointSet, IssuerUrl, Nonce, OAuth2TokenResponse as _,
    RedirectUrl, RequestTokenError, Scope, StandardErrorResponse, TokenUrl,
    core::{
        CoreAuthenticationFlow, CoreClient, CoreErrorResponseType, CoreProviderMetadata,
        CoreTokenResponse,
    },
};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use crate::{
    config::Cluster,
    error::{LoginError, error_chain},
    state_token::StateToken,
};

/// Endpoints and client settings used to talk to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub issuer: String,
    pub client_id: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

/// Builds the provider settings for `cluster`.
///
/// Endpoints come from the discovery document when given. Any endpoint it lacks
/// (discovery makes the token endpoint optional) follows the `{issuer}/auth` and
/// `{issuer}/token` convention. Logins always pass metadata, since ID token
/// verification needs the provider's keys; `None` yields the conventional
/// endpoints for offline inspection.
#[must_use]
pub fn build_auth_config(
    cluster: &Cluster,
    metadata: Option<&CoreProviderMetadata>,
) -> ProviderConfig {
    let issuer = cluster.issuer.trim_end_matches('/');
    let fixed_auth = || format!("{issuer}/auth");
    let fixed_token = || format!("{issuer}/token");
    let (auth_url, token_url) = match metadata {
        Some(meta) => (
            meta.authorization_endpoint().as_str().to_string(),
            meta.token_endpoint()
                .map_or_else(fixed_token, |url| url.as_str().to_string()),
        ),
        None => (fixed_auth(), fixed_token()),
    };
    ProviderConfig {
        issuer: cluster.issuer.clone(),
        client_id: cluster.client_id.clone(),
        auth_url,
        token_url,
        scopes: cluster.scopes.clone(),
        redirect_uri: cluster.redirect_uri.clone(),
    }
}

// Ready-to-use OIDC client type with the endpoints we require set
pub(crate) type OidcClientReady = CoreClient<
    EndpointSet,      // HasAuthUrl
    EndpointNotSet,   // HasDeviceAuthUrl
    EndpointNotSet,   // HasIntrospectionUrl
    EndpointNotSet,   // HasRevocationUrl
    EndpointSet,      // HasTokenUrl
    EndpointMaybeSet, // HasUserInfoUrl (from discovery, optional)
>;

/// Tokens handed out to the user after a successful login.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Raw compact JWT.
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub access_token: String,
}

/// A discovered provider, ready to start or finish a login.
pub struct Provider {
    config: ProviderConfig,
    client: OidcClientReady,
    http: reqwest::Client,
}

impl Provider {
    /// Runs OIDC discovery against the cluster's issuer.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Config`] if the configured URLs are invalid and
    /// [`LoginError::Upstream`] if discovery fails.
    #[tracing::instrument(skip_all, fields(issuer = %cluster.issuer))]
    pub async fn discover(cluster: &Cluster, http: reqwest::Client) -> Result<Self, LoginError> {
        let issuer = IssuerUrl::new(cluster.issuer.clone())
            .map_err(|e| LoginError::Config(format!("invalid issuer URL: {e}")))?;
        let metadata =
            CoreProviderMetadata::discover_async(issuer, &ReqwestClient::from(http.clone()))
                .await
                .map_err(|e| {
                    let detail = error_chain(&e);
                    tracing::warn!(%detail, "OIDC discovery failed");
                    LoginError::Upstream("discovery failed".to_string())
                })?;
        let config = build_auth_config(cluster, Some(&metadata));
        let client = build_client(&config, &cluster.client_secret, metadata)?;
        tracing::debug!(auth_url = %config.auth_url, token_url = %config.token_url, "provider discovered");
        Ok(Self {
            config,
            client,
            http,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Authorization endpoint URL carrying the state and its nonce.
    #[must_use]
    pub fn authorize_url(&self, state: &StateToken) -> Url {
        let csrf = state.as_str().to_string();
        let nonce = state.nonce().to_string();
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(csrf),
            move || Nonce::new(nonce),
        );
        // `openid` is always requested by the client
        for scope in self.config.scopes.iter().filter(|s| s.as_str() != "openid") {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, _csrf, _nonce) = request.url();
        url
    }

    /// Exchanges an authorization code and verifies the returned ID token.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::BadRequest`] if the provider rejects the code or the ID token
    /// was issued for a different login, and [`LoginError::Upstream`] for all other
    /// provider or transport failures.
    #[tracing::instrument(skip_all)]
    pub async fn exchange(&self, code: &str, nonce: &str) -> Result<TokenSet, LoginError> {
        let response: CoreTokenResponse = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&ReqwestClient::from(self.http.clone()))
            .await
            .map_err(|e| classify_token_error(&e))?;

        let Some(id_token) = response.extra_fields().id_token() else {
            tracing::warn!("No id_token in token response");
            return Err(LoginError::Upstream(
                "token response contains no id_token".to_string(),
            ));
        };
        id_token
            .claims(&self.client.id_token_verifier(), &Nonce::new(nonce.to_string()))
            .map_err(|e| {
                tracing::warn!(%e, "ID token verification failed");
                match e {
                    ClaimsVerificationError::InvalidNonce(_) => {
                        LoginError::BadRequest("ID token does not belong to this login".to_string())
                    }
                    _ => LoginError::Upstream("ID token verification failed".to_string()),
                }
            })?;

        Ok(TokenSet {
            id_token: id_token.to_string(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            access_token: response.access_token().secret().clone(),
        })
    }
}

fn build_client(
    config: &ProviderConfig,
    client_secret: &SecretString,
    metadata: CoreProviderMetadata,
) -> Result<OidcClientReady, LoginError> {
    let invalid = |what: &str, e: url::ParseError| LoginError::Config(format!("invalid {what}: {e}"));
    let secret = Some(client_secret.expose_secret())
        .filter(|s| !s.is_empty())
        .map(|s| ClientSecret::new(s.to_string()));
    Ok(CoreClient::from_provider_metadata(
        metadata,
        ClientId::new(config.client_id.clone()),
        secret,
    )
    .set_auth_uri(AuthUrl::new(config.auth_url.clone()).map_err(|e| invalid("auth URL", e))?)
    .set_token_uri(TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token URL", e))?)
    .set_redirect_uri(
        RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| invalid("redirect URI", e))?,
    ))
}

fn classify_token_error<RE: core::error::Error + 'static>(
    err: &RequestTokenError<RE, StandardErrorResponse<CoreErrorResponseType>>,
) -> LoginError {
    match *err {
        RequestTokenError::ServerResponse(ref resp) => {
            tracing::warn!(%resp, "provider rejected token request");
            if matches!(*resp.error(), CoreErrorResponseType::InvalidGrant) {
                LoginError::BadRequest(
                    "the authorization code is invalid or has expired".to_string(),
                )
            } else {
                LoginError::Upstream(resp.to_string())
            }
        }
        ref other => {
            tracing::warn!(detail = %error_chain(other), "token exchange failed");
            LoginError::Upstream("token exchange failed".to_string())
        }
    }
}
