use core::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::WrapErr as _;
use tokio::{net, signal};

use crate::{
    app::{AppState, state},
    config::{Config, TlsConfig},
    http::{router, tls::setup_tls_config},
};

/// Creates a future that resolves when a shutdown signal is received.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    res = signal::ctrl_c() => drop(res),
                }
            }
            Err(e) => {
                tracing::warn!(%e, "failed to create SIGTERM handler, only reacting to Ctrl-C");
                drop(signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        drop(signal::ctrl_c().await);
    }
}

/// Start the HTTP server with optional TLS.
pub(crate) async fn start_server(
    app_state: AppState,
    addr: SocketAddr,
    tls_opt: Option<&TlsConfig>,
) -> eyre::Result<()> {
    let prefix = app_state.config.web_path_prefix.clone();
    let app = router::create_app(app_state);

    match tls_opt {
        Some(tls_cfg) => {
            let rustls_cfg = setup_tls_config(tls_cfg).await?;
            tracing::info!("Listening on https://{}{}", addr, prefix);
            let server = axum_server::bind_rustls(addr, rustls_cfg).serve(app);
            tokio::select! {
                res = server => res?,
                () = shutdown_signal() => {
                    tracing::info!("Received shutdown, shutting down");
                }
            }
        }
        None => {
            tracing::info!("Listening on http://{}{}", addr, prefix);
            let listener = net::TcpListener::bind(addr)
                .await
                .wrap_err(format!("Failed to bind to {addr}"))?;
            let server = axum::serve(listener, app);
            tokio::select! {
                res = server => res?,
                () = shutdown_signal() => {
                    tracing::info!("Received shutdown, shutting down");
                }
            }
        }
    }

    Ok(())
}

/// Serves the loaded config until a shutdown signal arrives.
///
/// `port_override` and `bind_override` replace the respective part of the configured
/// listen address.
///
/// # Errors
///
/// Returns an error if the listen address is invalid, TLS setup fails, or the server cannot bind.
pub(crate) async fn start(
    config: Config,
    config_path: &Path,
    port_override: Option<u16>,
    bind_override: Option<&str>,
) -> eyre::Result<()> {
    tracing::info!("Starting HTTP server...");

    let app_state = state::initialize_state(config, config_path)?;

    let configured: SocketAddr = app_state
        .config
        .listen
        .parse()
        .wrap_err("Invalid listen address")?;
    let listen_ip: IpAddr = match bind_override {
        Some(bind) => bind
            .parse()
            .wrap_err(format!("Invalid bind address: {bind}"))?,
        None => configured.ip(),
    };
    let addr = SocketAddr::new(listen_ip, port_override.unwrap_or(configured.port()));

    let tls_opt = app_state.config.tls.clone();
    start_server(app_state, addr, tls_opt.as_ref()).await
}
