use axum_server::tls_rustls::RustlsConfig as AxumRustlsConfig;
use eyre::WrapErr as _;

use crate::config::TlsConfig;

/// Setup TLS configuration for the HTTPS listener.
///
/// Paths were already resolved relative to the config file while loading it.
#[tracing::instrument]
pub(crate) async fn setup_tls_config(tls_cfg: &TlsConfig) -> eyre::Result<AxumRustlsConfig> {
    let TlsConfig {
        ref cert_path,
        ref key_path,
    } = *tls_cfg;

    AxumRustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .wrap_err(format!(
            "Failed to load TLS certificates from cert: {}, key: {}",
            cert_path.display(),
            key_path.display()
        ))
}
