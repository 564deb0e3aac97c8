//! Login and callback handlers.
//!
//! `login/{cluster}` issues a signed state and redirects to the identity provider (or, in
//! dev mode, straight to our own callback). The callback verifies the state, exchanges the
//! code, and answers with the success page carrying the kubeconfig.

use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::{IntoResponse as _, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::Span;

use crate::{
    app::AppState,
    claims::ClaimsSet,
    config::Cluster,
    dev::{MOCK_AUTHORIZATION_CODE, dev_mode_tokens},
    error::LoginError,
    provider::Provider,
    render::Credential,
    state_token::StateToken,
    trust::build_http_client,
};

/// Returns a router with the login and callback routes below `prefix`.
pub(crate) fn routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("{prefix}login/{{cluster}}"), get(login))
        .route(&format!("{prefix}callback"), get(callback))
        .route(&format!("{prefix}callback/{{cluster}}"), get(cluster_callback))
}

#[derive(Deserialize)]
/// Query parameters for the callback.
pub(crate) struct CallbackQueryParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Trust material of one cluster, resolved for the current request.
struct ResolvedTrust {
    ca_pem: Option<Vec<u8>>,
    idp_ca_pem: Option<Vec<u8>>,
}

impl ResolvedTrust {
    async fn resolve(state: &AppState, cluster: &Cluster) -> Result<Self, LoginError> {
        let timeout = state.config.upstream_timeout();
        let (ca_pem, global_idp_ca) = tokio::try_join!(
            cluster.ca.resolve(timeout),
            state.config.idp_ca.resolve(timeout)
        )?;
        let idp_ca_pem = global_idp_ca.or_else(|| ca_pem.clone());
        Ok(Self { ca_pem, idp_ca_pem })
    }

    /// Extra roots for provider calls. The IdP CA is skipped when it is the cluster CA.
    fn extra_roots(&self) -> impl Iterator<Item = &[u8]> {
        let idp_ca = self
            .idp_ca_pem
            .as_deref()
            .filter(|idp_ca| self.ca_pem.as_deref() != Some(*idp_ca));
        self.ca_pem.as_deref().into_iter().chain(idp_ca)
    }

    /// Client for provider calls, trusting both CAs next to the system roots.
    fn http_client(&self, state: &AppState) -> Result<reqwest::Client, LoginError> {
        build_http_client(self.extra_roots(), state.config.upstream_timeout())
            .map_err(LoginError::from)
    }
}

/// Renders a request axum could not parse as the HTML error page.
fn malformed_request(
    state: &AppState,
    part: &str,
    rejection: &impl core::fmt::Display,
) -> Response {
    tracing::warn!(%rejection, "malformed {part}");
    let err = LoginError::BadRequest(format!("malformed {part}"));
    state.renderer.error_response(&err, &state.config, None)
}

/// Initiate the login for a cluster.
#[axum::debug_handler]
#[tracing::instrument(skip_all, fields(cluster))]
pub(crate) async fn login(
    State(state): State<AppState>,
    cluster_name: Result<Path<String>, PathRejection>,
) -> Response {
    let cluster_name = match cluster_name {
        Ok(Path(name)) => name,
        Err(rejection) => return malformed_request(&state, "cluster name", &rejection),
    };
    Span::current().record("cluster", cluster_name.as_str());
    match start_login(&state, &cluster_name).await {
        Ok(response) => response,
        Err(e) => state
            .renderer
            .error_response(&e, &state.config, state.config.cluster(&cluster_name)),
    }
}

async fn start_login(state: &AppState, cluster_name: &str) -> Result<Response, LoginError> {
    let cluster = state
        .config
        .cluster(cluster_name)
        .ok_or_else(|| LoginError::UnknownCluster(cluster_name.to_string()))?;
    let login_state = StateToken::issue(&cluster.name, &state.state_secret);

    if cluster.dev_mode {
        let target = format!(
            "{}?code={MOCK_AUTHORIZATION_CODE}&state={}",
            state.config.callback_path(cluster),
            login_state.as_str()
        );
        tracing::info!("Dev mode login, redirecting to own callback");
        return Ok(Redirect::to(&target).into_response());
    }

    let http = ResolvedTrust::resolve(state, cluster)
        .await?
        .http_client(state)?;
    let provider = Provider::discover(cluster, http).await?;
    let auth_url = provider.authorize_url(&login_state);
    tracing::info!(endpoint = %provider.config().auth_url, "Redirecting to identity provider");
    Ok(Redirect::to(auth_url.as_str()).into_response())
}

/// Callback without a cluster in the path, the cluster is taken from the state.
#[axum::debug_handler]
#[tracing::instrument(skip_all, fields(cluster))]
pub(crate) async fn callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackQueryParams>, QueryRejection>,
) -> Response {
    match params {
        Ok(Query(params)) => finish_login_or_error(&state, None, params).await,
        Err(rejection) => malformed_request(&state, "query string", &rejection),
    }
}

/// Callback for a specific cluster; states issued for other clusters are rejected.
#[axum::debug_handler]
#[tracing::instrument(skip_all, fields(cluster))]
pub(crate) async fn cluster_callback(
    State(state): State<AppState>,
    cluster_name: Result<Path<String>, PathRejection>,
    params: Result<Query<CallbackQueryParams>, QueryRejection>,
) -> Response {
    let cluster_name = match cluster_name {
        Ok(Path(name)) => name,
        Err(rejection) => return malformed_request(&state, "cluster name", &rejection),
    };
    Span::current().record("cluster", cluster_name.as_str());
    match params {
        Ok(Query(params)) => finish_login_or_error(&state, Some(&cluster_name), params).await,
        Err(rejection) => malformed_request(&state, "query string", &rejection),
    }
}

async fn finish_login_or_error(
    state: &AppState,
    path_cluster: Option<&str>,
    params: CallbackQueryParams,
) -> Response {
    match finish_login(state, path_cluster, params).await {
        Ok(response) => response,
        Err(e) => state.renderer.error_response(
            &e,
            &state.config,
            path_cluster.and_then(|name| state.config.cluster(name)),
        ),
    }
}

/// Verify state (present in query params, signed by us, fresh and for this cluster)
fn verify_state<'cfg>(
    state: &'cfg AppState,
    path_cluster: Option<&str>,
    state_param: Option<&str>,
) -> Result<(StateToken, &'cfg Cluster), LoginError> {
    let state_param = state_param
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LoginError::BadRequest("missing state parameter".to_string()))?;
    let login_state = StateToken::verify(state_param, &state.state_secret)
        .map_err(|e| LoginError::BadRequest(e.to_string()))?;

    if let Some(path_cluster) = path_cluster
        && path_cluster != login_state.cluster()
    {
        tracing::warn!(issued_for = %login_state.cluster(), "state was issued for another cluster");
        return Err(LoginError::BadRequest(
            "state was issued for another cluster".to_string(),
        ));
    }
    let cluster = state.config.cluster(login_state.cluster()).ok_or_else(|| {
        LoginError::BadRequest("state was issued for an unknown cluster".to_string())
    })?;
    Ok((login_state, cluster))
}

async fn finish_login(
    state: &AppState,
    path_cluster: Option<&str>,
    CallbackQueryParams {
        code,
        state: state_param,
        error,
        error_description,
    }: CallbackQueryParams,
) -> Result<Response, LoginError> {
    if let Some(name) = path_cluster
        && state.config.cluster(name).is_none()
    {
        return Err(LoginError::UnknownCluster(name.to_string()));
    }

    // If provider returned an error, report it as the caller's fault
    if let Some(err) = error {
        tracing::warn!(%err, "OIDC error from provider: {error_description}", error_description = error_description.as_deref().unwrap_or("No Description"));
        return Err(LoginError::BadRequest(format!(
            "the identity provider reported: {err}"
        )));
    }

    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LoginError::BadRequest("missing authorization code".to_string()))?;
    let (login_state, cluster) = verify_state(state, path_cluster, state_param.as_deref())?;
    Span::current().record("cluster", login_state.cluster());

    // The mock code is only ever valid for dev mode clusters
    let is_mock_code = code == MOCK_AUTHORIZATION_CODE;
    if cluster.dev_mode != is_mock_code {
        return Err(LoginError::BadRequest(
            "invalid authorization code".to_string(),
        ));
    }

    let trust = ResolvedTrust::resolve(state, cluster).await?;
    let tokens = if cluster.dev_mode {
        tracing::info!("Dev mode callback, synthesizing tokens");
        dev_mode_tokens(cluster, login_state.nonce())
    } else {
        let provider = Provider::discover(cluster, trust.http_client(state)?).await?;
        provider.exchange(&code, login_state.nonce()).await?
    };

    let claims = ClaimsSet::from_id_token(&tokens.id_token).ok_or_else(|| {
        LoginError::Upstream("the ID token payload is not a JSON object".to_string())
    })?;
    tracing::info!(sub = ?claims.get("sub"), "Login succeeded");

    state.renderer.render_success(
        &state.config,
        &Credential {
            cluster,
            tokens: &tokens,
            claims: &claims,
            ca_pem: trust.ca_pem.as_deref(),
            idp_ca_pem: trust.idp_ca_pem.as_deref(),
        },
    )
}
