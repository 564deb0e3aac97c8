use alloc::sync::Arc;
use std::path::Path;

use eyre::WrapErr as _;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::{
    config::Config,
    render::Renderer,
};

/// Application state shared across request handlers.
///
/// Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub renderer: Arc<Renderer>,
    /// Key for signing login state tokens.
    pub state_secret: Arc<SecretString>,
    /// Whether the HTTP server was started with TLS enabled (true for HTTPS)
    pub tls_enabled: bool,
}

impl AppState {
    /// Builds the state from a loaded config.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded templates fail to compile.
    pub fn new(config: Config) -> eyre::Result<Self> {
        let state_secret = config.state_secret.clone().unwrap_or_else(|| {
            warn!(
                "No state_secret configured, generated a random one. Logins started on other instances or before a restart will fail."
            );
            Arc::new(SecretString::from(kubegate_common::generate_secret()))
        });
        let renderer = Renderer::new().wrap_err("Failed to compile HTML templates")?;
        Ok(Self {
            tls_enabled: config.tls.is_some(),
            config: Arc::new(config),
            renderer: Arc::new(renderer),
            state_secret,
        })
    }
}

/// Emit startup warnings based on configuration and runtime state.
fn emit_startup_warnings(app_state: &AppState, config_path: &Path) {
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt as _;
        if let Ok(metadata) = fs::metadata(config_path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "Config file permissions are too permissive (current: {mode:#o}). Run 'chmod 600 {}' to restrict access to owner only.",
                    config_path.display()
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = config_path;

    for cluster in app_state.config.clusters.iter().filter(|c| c.dev_mode) {
        warn!(
            cluster = %cluster.name,
            "Cluster runs in dev mode: logins bypass the identity provider and hand out unsigned tokens."
        );
    }

    if !app_state.tls_enabled {
        info!(
            "TLS is disabled. Serve behind an HTTPS reverse proxy, the rendered pages contain credentials."
        );
    }
}

/// Initialize application state from a loaded config.
#[tracing::instrument(skip_all)]
pub(super) fn initialize_state(config: Config, config_path: &Path) -> eyre::Result<AppState> {
    info!(clusters = config.clusters.len(), "Loaded config");
    let app_state = AppState::new(config)?;
    emit_startup_warnings(&app_state, config_path);
    Ok(app_state)
}

/// State for handler tests, built from config text without touching the environment.
#[cfg(test)]
pub(crate) fn state_from_toml(toml_str: &str) -> AppState {
    use crate::config::{EnvExpander, parse};

    let config = parse(
        toml_str,
        &EnvExpander::with_lookup(|_| None),
        Path::new("/etc/kubegate/kubegate.toml"),
    )
    .expect("test config is valid");
    AppState::new(config).expect("templates compile")
}
