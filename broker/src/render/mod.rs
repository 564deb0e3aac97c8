//! HTML pages and the kubeconfig handed out after a login.
//!
//! Templates are compiled into the binary and rendered with handlebars, which escapes
//! every `{{value}}` for HTML. Claims, cluster settings and the logo URI all pass
//! through that escaping.

mod kubeconfig;

pub use kubeconfig::{Kubeconfig, build_kubeconfig, context_name};

use axum::{
    http::{
        StatusCode,
        header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    response::{IntoResponse as _, Response},
};
use handlebars::{Handlebars, TemplateError};
use serde::Serialize;

use crate::{
    claims::{ClaimsSet, derive_username},
    config::{Cluster, Config},
    error::LoginError,
    provider::TokenSet,
};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const LAYOUT: &str = "layout";
const INDEX: &str = "index";
const TOKEN: &str = "token";
const ERROR: &str = "error";

const FALLBACK_ERROR_PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Error</title></head>\
<body><p>An error occurred while rendering this page.</p></body></html>\n";

/// Everything the success page shows for one finished login.
pub struct Credential<'req> {
    pub cluster: &'req Cluster,
    pub tokens: &'req TokenSet,
    pub claims: &'req ClaimsSet,
    /// Cluster CA, `None` when the system trust store is used.
    pub ca_pem: Option<&'req [u8]>,
    /// CA the identity provider is trusted with.
    pub idp_ca_pem: Option<&'req [u8]>,
}

#[derive(Serialize)]
struct IndexEntry<'cfg> {
    name: &'cfg str,
    short_description: &'cfg str,
    description: &'cfg str,
    login_path: String,
}

#[derive(Serialize)]
struct IndexPage<'cfg> {
    title: &'static str,
    logo_uri: Option<&'cfg str>,
    clusters: Vec<IndexEntry<'cfg>>,
}

#[derive(Serialize)]
struct TokenPage<'req> {
    title: String,
    logo_uri: Option<&'req str>,
    home: &'req str,
    cluster_name: &'req str,
    username: String,
    context: String,
    namespace: &'req str,
    kubeconfig: String,
    kubectl_version: &'req str,
    kubectl_linux_url: String,
    kubectl_darwin_url: String,
    ca_pem: Option<String>,
    claims: String,
}

#[derive(Serialize)]
struct ErrorPage<'req> {
    title: &'static str,
    logo_uri: Option<&'req str>,
    home: &'req str,
    status: String,
    message: &'req str,
}

/// Renders all HTML responses of the broker.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Compiles the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a template does not parse.
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial(LAYOUT, include_str!("../../templates/layout.html.hbs"))?;
        registry.register_template_string(INDEX, include_str!("../../templates/index.html.hbs"))?;
        registry.register_template_string(TOKEN, include_str!("../../templates/token.html.hbs"))?;
        registry.register_template_string(ERROR, include_str!("../../templates/error.html.hbs"))?;
        Ok(Self { registry })
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, LoginError> {
        self.registry
            .render(name, data)
            .map_err(|e| LoginError::Internal(format!("failed to render {name} template: {e}")))
    }

    /// Page listing every configured cluster with its login link.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Internal`] if rendering fails.
    pub fn render_index(&self, config: &Config) -> Result<Response, LoginError> {
        let page = IndexPage {
            title: "Kubernetes login",
            logo_uri: config.logo_uri_for(None),
            clusters: config
                .clusters
                .iter()
                .map(|cluster| IndexEntry {
                    name: &cluster.name,
                    short_description: &cluster.short_description,
                    description: &cluster.description,
                    login_path: config.login_path(cluster),
                })
                .collect(),
        };
        Ok(html_response(StatusCode::OK, self.render(INDEX, &page)?))
    }

    /// Page with the kubeconfig and claims of a finished login.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Internal`] if serializing the kubeconfig or rendering fails.
    pub fn render_success(
        &self,
        config: &Config,
        credential: &Credential<'_>,
    ) -> Result<Response, LoginError> {
        let Credential {
            cluster,
            tokens,
            claims,
            ca_pem,
            idp_ca_pem,
        } = *credential;
        let username = derive_username(claims);
        let kubeconfig = build_kubeconfig(cluster, tokens, &username, ca_pem, idp_ca_pem)
            .to_yaml()
            .map_err(|e| LoginError::Internal(format!("failed to serialize kubeconfig: {e}")))?;
        let kubectl_version = config.kubectl_version_for(cluster);
        let page = TokenPage {
            title: format!("Logged into {}", cluster.name),
            logo_uri: config.logo_uri_for(Some(cluster)),
            home: &config.web_path_prefix,
            cluster_name: &cluster.name,
            context: context_name(cluster, &username),
            username,
            namespace: &cluster.namespace,
            kubeconfig,
            kubectl_version,
            kubectl_linux_url: kubectl_download_url(kubectl_version, "linux"),
            kubectl_darwin_url: kubectl_download_url(kubectl_version, "darwin"),
            ca_pem: ca_pem.map(|pem| String::from_utf8_lossy(pem).into_owned()),
            claims: claims.pretty(),
        };
        Ok(html_response(StatusCode::OK, self.render(TOKEN, &page)?))
    }

    /// Minimal error page with the given status.
    ///
    /// Falls back to a static page if the template cannot be rendered.
    #[must_use]
    pub fn render_error(
        &self,
        message: &str,
        status: StatusCode,
        logo_uri: Option<&str>,
        home: &str,
    ) -> Response {
        let page = ErrorPage {
            title: status.canonical_reason().unwrap_or("Error"),
            logo_uri,
            home,
            status: status.to_string(),
            message,
        };
        match self.render(ERROR, &page) {
            Ok(body) => html_response(status, body),
            Err(e) => {
                tracing::error!(%e, "falling back to static error page");
                html_response(status, FALLBACK_ERROR_PAGE.to_string())
            }
        }
    }

    /// Logs `err` and renders its public message.
    ///
    /// Provider and trust fetch failures are logged at `warn`, they are not faults of the broker.
    #[must_use]
    pub fn error_response(
        &self,
        err: &LoginError,
        config: &Config,
        cluster: Option<&Cluster>,
    ) -> Response {
        let status = err.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, %status, "login failed");
        } else {
            tracing::warn!(error = %err, %status, "login rejected");
        }
        self.render_error(
            &err.public_message(),
            status,
            config.logo_uri_for(cluster),
            &config.web_path_prefix,
        )
    }
}

fn kubectl_download_url(version: &str, os: &str) -> String {
    format!("https://dl.k8s.io/release/{version}/bin/{os}/amd64/kubectl")
}

/// HTML response with the content type and sniffing protection every page carries.
pub fn html_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (CONTENT_TYPE, HTML_CONTENT_TYPE),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response()
}
