//! Request-path errors and their HTTP status mapping.

use axum::http::StatusCode;

use crate::trust::TrustError;

/// Everything that can go wrong while serving a login request.
///
/// The carried message is logged. Only [`LoginError::public_message`] is shown to users.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("unknown cluster: {0}")]
    UnknownCluster(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to fetch trust material: {0}")]
    TrustFetch(String),
    #[error("identity provider error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoginError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match *self {
            Self::UnknownCluster(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TrustFetch(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to render into an error page.
    ///
    /// Configuration and internal details stay in the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match *self {
            Self::UnknownCluster(ref name) => format!("Unknown cluster: {name}"),
            Self::BadRequest(ref msg) => format!("Bad request: {msg}"),
            Self::Config(_) => "The login service is misconfigured.".to_string(),
            Self::TrustFetch(_) => {
                "Could not fetch the certificate authority for this cluster.".to_string()
            }
            Self::Upstream(ref msg) => format!("The identity provider returned an error: {msg}"),
            Self::Internal(_) => "Internal server error.".to_string(),
        }
    }
}

impl From<TrustError> for LoginError {
    fn from(err: TrustError) -> Self {
        let detail = error_chain(&err);
        match err {
            TrustError::Fetch { .. } | TrustError::Status { .. } => Self::TrustFetch(detail),
            TrustError::Unreadable { .. }
            | TrustError::InvalidCertificate(_)
            | TrustError::NoCertificate
            | TrustError::Client(_) => Self::Config(detail),
        }
    }
}

/// Formats an error with all its sources, separated by `: `.
pub(crate) fn error_chain(err: &dyn core::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
