//! Kubeconfig document handed out after a login.
//!
//! The user entry uses the `oidc` auth provider, so kubectl can refresh the ID token
//! with the refresh token on its own.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::ExposeSecret as _;
use serde::Serialize;

use crate::{config::Cluster, provider::TokenSet};

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub users: Vec<NamedUser>,
    pub contexts: Vec<NamedContext>,
    pub current_context: String,
}

#[derive(Debug, Serialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    pub server: String,
    /// Base64 of the CA PEM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserEntry,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserEntry {
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Serialize)]
pub struct AuthProvider {
    pub name: String,
    pub config: OidcProviderConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OidcProviderConfig {
    pub client_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub idp_issuer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_certificate_authority_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Serialize)]
pub struct ContextEntry {
    pub cluster: String,
    pub user: String,
    pub namespace: String,
}

/// Context name: the cluster name for static contexts, `<user>-<cluster>` otherwise.
#[must_use]
pub fn context_name(cluster: &Cluster, username: &str) -> String {
    if cluster.static_context_name {
        cluster.name.clone()
    } else {
        format!("{username}-{}", cluster.name)
    }
}

/// Builds the kubeconfig for a finished login.
///
/// `ca_pem` is the cluster CA, `idp_ca_pem` the CA the identity provider is trusted with
/// (the cluster CA unless a dedicated one is configured).
#[must_use]
pub fn build_kubeconfig(
    cluster: &Cluster,
    tokens: &TokenSet,
    username: &str,
    ca_pem: Option<&[u8]>,
    idp_ca_pem: Option<&[u8]>,
) -> Kubeconfig {
    let context = context_name(cluster, username);
    let user = format!("{username}-{}", cluster.name);
    Kubeconfig {
        api_version: "v1".to_string(),
        kind: "Config".to_string(),
        clusters: vec![NamedCluster {
            name: cluster.name.clone(),
            cluster: ClusterEntry {
                server: cluster.k8s_master_uri.clone(),
                certificate_authority_data: ca_pem.map(|pem| STANDARD.encode(pem)),
            },
        }],
        users: vec![NamedUser {
            name: user.clone(),
            user: UserEntry {
                auth_provider: AuthProvider {
                    name: "oidc".to_string(),
                    config: OidcProviderConfig {
                        client_id: cluster.client_id.clone(),
                        client_secret: cluster.client_secret.expose_secret().to_string(),
                        id_token: tokens.id_token.clone(),
                        refresh_token: tokens.refresh_token.clone(),
                        idp_issuer_url: cluster.issuer.clone(),
                        idp_certificate_authority_data: idp_ca_pem.map(|pem| STANDARD.encode(pem)),
                    },
                },
            },
        }],
        contexts: vec![NamedContext {
            name: context.clone(),
            context: ContextEntry {
                cluster: cluster.name.clone(),
                user,
                namespace: cluster.namespace.clone(),
            },
        }],
        current_context: context,
    }
}

impl Kubeconfig {
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
