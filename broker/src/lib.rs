//! Library entry for the `kubegate` broker.
//!
//! Exposes `inner_main` so a workspace-level shim binary can call into the broker logic.
//!
//! The broker walks users through an OpenID Connect login against the identity provider
//! of a configured Kubernetes cluster and renders a ready-to-use kubeconfig.
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "This is not problematic in tests",)
)]

extern crate alloc;
extern crate core;

pub mod app;
pub mod claims;
pub mod cli;
pub mod config;
pub mod dev;
pub mod error;
pub mod http;
pub mod provider;
pub mod render;
pub mod state_token;
pub mod trust;

use std::env;
use std::fs;
use std::sync::Once;

use eyre::{Result, WrapErr as _};
use tracing::{Instrument as _, info};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();
static INIT_RUSTLS: Once = Once::new();

/// Installs the OpenSSL backed rustls provider as process default.
///
/// Must run before any TLS client or server is built. Calling it again is a no-op.
///
/// # Panics
///
/// Panics if a different crypto provider was installed before.
pub fn install_crypto_provider() {
    INIT_RUSTLS.call_once(|| {
        rustls_openssl::default_provider()
            .install_default()
            .expect("failed to install default rustls provider");
    });
}

fn init_tracing(format: LogFormat, debug: bool) {
    INIT_TRACING.call_once(move || {
        let default_level = if env::var("KUBEGATE_INTEGRATION_TEST").is_ok() {
            "error"
        } else if debug {
            "debug"
        } else {
            "info"
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_timer(ChronoLocal::rfc_3339());

        match format {
            LogFormat::Compact => builder.compact().init(),
            LogFormat::Json => builder.json().init(),
            LogFormat::Pretty => builder.pretty().init(),
        }
    });
}

/// The broker's main function; can be called from a shim binary.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server fails to start.
///
/// # Panics
///
/// Panics if the OpenSSL crypto provider cannot be installed.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    match invocation.command {
        Command::Serve(args) => {
            let config_arg = &args.config;
            let config_path = fs::canonicalize(config_arg)
                .wrap_err(format!("Config file not found at: {config_arg}"))?;

            let loaded = config::load(&config_path).await?;
            init_tracing(args.log_format, loaded.debug);

            let startup_span = tracing::info_span!("kubegate.startup", ?config_path, pid=?std::process::id(), version = env!("CARGO_PKG_VERSION"));

            install_crypto_provider();

            info!(parent: &startup_span, "Starting kubegate");

            app::start(loaded, &config_path, args.port, args.bind.as_deref())
                .instrument(startup_span)
                .await?;
            Ok(())
        }
        Command::CheckConfig { config } => {
            let loaded = config::load(&config)
                .await
                .wrap_err(format!("Invalid config at: {config}"))?;
            println!(
                "Config OK: listening on {}, {} cluster(s)",
                loaded.listen,
                loaded.clusters.len()
            );
            for cluster in &loaded.clusters {
                let mode = if cluster.dev_mode { "dev" } else { "live" };
                println!(
                    "  {} ({mode}) -> {}",
                    cluster.name,
                    loaded.login_path(cluster)
                );
            }
            Ok(())
        }
    }
}
