//! Trust material resolution.
//!
//! A cluster's CA certificate comes from at most one of three sources: inline PEM,
//! a local file or a remote URI. The resolved PEM is trusted by the outbound HTTP
//! client used for the identity provider and embedded into the rendered kubeconfig.
//! Resolution happens per request, so rotated certificates are picked up without a restart.

use core::time::Duration;
use std::{io, path::PathBuf};

use reqwest::{Certificate, StatusCode, redirect::Policy};
use serde::Deserialize;
use tokio::fs;

/// Where a CA certificate comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TrustSourceFields")]
pub enum TrustSource {
    /// No custom CA, rely on the system trust store.
    #[default]
    System,
    /// PEM text, used verbatim.
    Inline(String),
    /// Path of a PEM file, read on every resolution.
    File(PathBuf),
    /// URI the PEM is fetched from on every resolution.
    Remote(String),
}

/// Configuration shape of a [`TrustSource`]: a table with at most one key set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrustSourceFields {
    pem: Option<String>,
    pem_file: Option<PathBuf>,
    uri: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("at most one of `pem`, `pem_file` and `uri` may be set for a CA, found {0}")]
pub struct ConflictingTrustSources(usize);

impl TryFrom<TrustSourceFields> for TrustSource {
    type Error = ConflictingTrustSources;

    fn try_from(fields: TrustSourceFields) -> Result<Self, Self::Error> {
        // Empty strings count as unset
        let pem = fields.pem.filter(|s| !s.is_empty());
        let pem_file = fields.pem_file.filter(|p| !p.as_os_str().is_empty());
        let uri = fields.uri.filter(|s| !s.is_empty());

        match (pem, pem_file, uri) {
            (None, None, None) => Ok(Self::System),
            (Some(pem), None, None) => Ok(Self::Inline(pem)),
            (None, Some(path), None) => Ok(Self::File(path)),
            (None, None, Some(uri)) => Ok(Self::Remote(uri)),
            (pem, pem_file, uri) => Err(ConflictingTrustSources(
                usize::from(pem.is_some())
                    + usize::from(pem_file.is_some())
                    + usize::from(uri.is_some()),
            )),
        }
    }
}

/// Failures while resolving trust material.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("failed to read CA file {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to fetch CA from {uri}")]
    Fetch {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetching CA from {uri} returned status {status}")]
    Status { uri: String, status: StatusCode },
    #[error("invalid CA certificate")]
    InvalidCertificate(#[source] reqwest::Error),
    #[error("CA bundle contains no PEM certificate")]
    NoCertificate,
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl TrustSource {
    /// `true` for a non-system source whose value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match *self {
            Self::System => false,
            Self::Inline(ref pem) => pem.is_empty(),
            Self::File(ref path) => path.as_os_str().is_empty(),
            Self::Remote(ref uri) => uri.is_empty(),
        }
    }

    /// Resolves the source into PEM bytes, or `None` for the system trust store.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Unreadable`] if a file source cannot be read, and
    /// [`TrustError::Fetch`] or [`TrustError::Status`] if a remote source cannot be fetched.
    #[tracing::instrument(level = "debug", skip_all, fields(source = self.kind()))]
    pub async fn resolve(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TrustError> {
        match *self {
            Self::System => Ok(None),
            Self::Inline(ref pem) => Ok(Some(pem.as_bytes().to_vec())),
            Self::File(ref path) => fs::read(path)
                .await
                .map(Some)
                .map_err(|source| TrustError::Unreadable {
                    path: path.clone(),
                    source,
                }),
            Self::Remote(ref uri) => fetch_remote(uri, timeout).await.map(Some),
        }
    }

    const fn kind(&self) -> &'static str {
        match *self {
            Self::System => "system",
            Self::Inline(_) => "inline",
            Self::File(_) => "file",
            Self::Remote(_) => "remote",
        }
    }
}

async fn fetch_remote(uri: &str, timeout: Duration) -> Result<Vec<u8>, TrustError> {
    let fetch_err = |source| TrustError::Fetch {
        uri: uri.to_string(),
        source,
    };
    let client = reqwest::Client::builder()
        .redirect(Policy::limited(3))
        .timeout(timeout)
        .build()
        .map_err(TrustError::Client)?;
    let response = client.get(uri).send().await.map_err(fetch_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(TrustError::Status {
            uri: uri.to_string(),
            status,
        });
    }
    let body = response.bytes().await.map_err(fetch_err)?;
    tracing::debug!(%uri, len = body.len(), "fetched remote CA");
    Ok(body.to_vec())
}

/// Builds the outbound HTTP client for identity provider calls.
///
/// Every certificate in each of the given PEM bundles is trusted in addition to the
/// system roots. Redirects are not followed and every request is bounded by `timeout`.
///
/// # Errors
///
/// Returns [`TrustError::InvalidCertificate`] or [`TrustError::NoCertificate`] if a bundle
/// does not consist of valid PEM certificates.
pub fn build_http_client<'pem>(
    extra_roots: impl IntoIterator<Item = &'pem [u8]>,
    timeout: Duration,
) -> Result<reqwest::Client, TrustError> {
    let mut builder = reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(timeout);
    for pem in extra_roots {
        let certs = Certificate::from_pem_bundle(pem).map_err(TrustError::InvalidCertificate)?;
        if certs.is_empty() {
            return Err(TrustError::NoCertificate);
        }
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }
    builder.build().map_err(TrustError::Client)
}
