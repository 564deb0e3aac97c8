//! Configuration data types and structures for the broker.
//!
//! This module contains all the data structures used for configuration,
//! including listener, TLS, trust material and per-cluster settings.

use alloc::sync::Arc;
use core::time::Duration;
use std::path::{Component, Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::trust::TrustSource;

/// Root config structure for the broker.
///
/// ```toml
/// listen = "127.0.0.1:5555"
/// web_path_prefix = "/"
///
/// [[clusters]]
/// name = "prod"
/// issuer = "https://dex.example.com"
/// client_id = "kubegate"
/// client_secret = "${PROD_CLIENT_SECRET}"
/// redirect_uri = "https://login.example.com/callback/prod"
/// k8s_master_uri = "https://prod.k8s.example.com:6443"
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Socket address of the HTTP listener.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Prefix applied to every route and generated link. Normalized to start and end with `/`.
    #[serde(default = "default_web_path_prefix")]
    pub web_path_prefix: String,
    /// Lowers the default log level to `debug` (unless `RUST_LOG` is set).
    #[serde(default)]
    pub debug: bool,
    /// Logo shown on every page, can be overridden per cluster.
    #[serde(default)]
    pub logo_uri: Option<String>,
    /// kubectl version referenced in install hints, can be overridden per cluster.
    #[serde(default = "default_kubectl_version")]
    pub kubectl_version: String,
    /// Upper bound for every outbound call (CA fetch, discovery, token exchange).
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Key for signing login state tokens. Instances behind one load balancer must share it.
    /// If omitted, a random key is generated on startup.
    #[serde(default)]
    pub state_secret: Option<Arc<SecretString>>,
    /// Optional TLS configuration for serving HTTPS.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Additional CA trusted when talking to identity providers of all clusters.
    #[serde(default)]
    pub idp_ca: TrustSource,
    /// Configured clusters, in display order.
    pub clusters: Vec<Cluster>,
}

/// TLS configuration for the HTTP listener.
///
/// Paths in the config are interpreted relative to the config file when not absolute.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// One Kubernetes cluster users can log into.
#[derive(Debug, Deserialize, Clone)]
pub struct Cluster {
    /// Unique name, used in URL paths. Restricted to URL-unreserved characters.
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    /// OIDC issuer URL of the identity provider. May be empty for dev mode clusters.
    #[serde(default)]
    pub issuer: String,
    pub client_id: String,
    #[serde(default = "empty_secret")]
    pub client_secret: Arc<SecretString>,
    /// Redirect URI registered with the identity provider, pointing back at our callback.
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// CA of the cluster's API server. Embedded in the kubeconfig and trusted for provider calls.
    #[serde(default)]
    pub ca: TrustSource,
    /// API server endpoint written into the kubeconfig.
    pub k8s_master_uri: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Use the cluster name as kubeconfig context name instead of `<user>-<cluster>`.
    #[serde(default)]
    pub static_context_name: bool,
    /// Skip the identity provider entirely and accept the mock authorization code.
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub kubectl_version: Option<String>,
}

impl Config {
    /// Looks up a cluster by its name.
    #[must_use]
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Logo for pages of `cluster`, falling back to the global one.
    #[must_use]
    pub fn logo_uri_for<'cfg>(&'cfg self, cluster: Option<&'cfg Cluster>) -> Option<&'cfg str> {
        cluster
            .and_then(|c| c.logo_uri.as_deref())
            .or(self.logo_uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }

    #[must_use]
    pub fn kubectl_version_for<'cfg>(&'cfg self, cluster: &'cfg Cluster) -> &'cfg str {
        cluster
            .kubectl_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.kubectl_version)
    }

    /// Path of the login route of `cluster`, including the prefix.
    #[must_use]
    pub fn login_path(&self, cluster: &Cluster) -> String {
        format!("{}login/{}", self.web_path_prefix, cluster.name)
    }

    /// Path of the cluster specific callback route, including the prefix.
    #[must_use]
    pub fn callback_path(&self, cluster: &Cluster) -> String {
        format!("{}callback/{}", self.web_path_prefix, cluster.name)
    }
}

fn default_listen() -> String {
    "127.0.0.1:5555".to_string()
}

fn default_web_path_prefix() -> String {
    "/".to_string()
}

fn default_kubectl_version() -> String {
    "v1.33.0".to_string()
}

const fn default_upstream_timeout_secs() -> u64 {
    5
}

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email", "offline_access"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn empty_secret() -> Arc<SecretString> {
    Arc::new(SecretString::from(""))
}

/// Normalizes a web path prefix so that it starts and ends with exactly one `/`.
#[must_use]
pub fn normalize_web_path_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Resolves a path to an absolute one.
///
/// If the path is absolute, returns it as-is. If relative, joins it with the
/// config file's parent directory and normalizes the result to remove redundant
/// components like `./`.
pub fn resolve_config_relative_paths(config_path: &Path, relative_path: &Path) -> PathBuf {
    let resolved = if relative_path.is_absolute() {
        relative_path.to_path_buf()
    } else {
        config_path
            .parent()
            .map_or_else(|| relative_path.to_path_buf(), |d| d.join(relative_path))
    };

    // Normalize the path to remove redundant ./ components
    // We can't use canonicalize() because the file might not exist yet
    normalize_path(&resolved)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        use Component as C;
        match component {
            C::Normal(c) => {
                result.push(c);
            }
            C::ParentDir => {
                result.pop();
            }
            C::CurDir => {}
            C::RootDir | C::Prefix(_) => {
                result.push(component);
            }
        }
    }
    result
}
