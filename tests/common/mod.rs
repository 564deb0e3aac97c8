use std::process::{Child, Command};
use std::time::{Duration, Instant};

use reqwest::{Client, redirect::Policy};

pub fn get_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("failed to bind to address")
        .local_addr()
        .unwrap()
        .port()
}

/// Guard that kills and waits on a child process when dropped.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        drop(self.0.kill());
        drop(self.0.wait());
    }
}

/// Spawn the broker from a given config string.
/// Writes the config to a temp file and serves it on `port`.
pub fn spawn_broker_with_config(port: u16, config_toml: &str) -> KillOnDrop {
    let tmp = std::env::temp_dir().join(format!("kubegate_integration_config_{port}.toml"));
    std::fs::write(&tmp, config_toml).expect("failed to write config");

    let child = Command::new(env!("CARGO_BIN_EXE_kubegate"))
        .args([
            "serve",
            "--config",
            tmp.to_str().unwrap(),
            "--port",
            &port.to_string(),
        ])
        .env("KUBEGATE_INTEGRATION_TEST", "1")
        .spawn()
        .expect("failed to start kubegate");
    KillOnDrop(child)
}

/// Block until a TCP listener is accepting on `127.0.0.1:port` or timeout.
pub async fn wait_for_listening(port: u16, timeout_secs: u64) {
    let start = Instant::now();
    while std::net::TcpStream::connect(("127.0.0.1", port)).is_err() {
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "server did not start within timeout"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> Client {
    kubegate_broker::install_crypto_provider();
    Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("failed to build client")
}

/// A cluster section running in dev mode.
pub fn dev_cluster(name: &str, port: u16) -> String {
    format!(
        r#"
        [[clusters]]
        name = "{name}"
        short_description = "The {name} cluster"
        client_id = "{name}-client"
        redirect_uri = "http://127.0.0.1:{port}/callback/{name}"
        k8s_master_uri = "https://{name}.k8s.example.com:6443"
        dev_mode = true

        [clusters.ca]
        pem = "{name}-ca-pem"
        "#
    )
}
