//! Configuration loading utilities for the broker.
//!
//! Reads the TOML file, expands `${NAME}` placeholders, normalizes paths and
//! validates the result before the server starts.

use core::net::SocketAddr;
use std::{collections::HashSet, path::Path};

use eyre::{WrapErr as _, bail, ensure};
use secrecy::ExposeSecret as _;
use tokio::fs;

use crate::{
    config::{
        Config, EnvExpander, SubstituteEnv as _, normalize_web_path_prefix,
        resolve_config_relative_paths,
    },
    trust::TrustSource,
};

/// Reads and parses the broker config from a TOML file.
///
/// Placeholders are expanded from the process environment.
///
/// # Errors
///
/// Returns an error if the config file cannot be read, parsed or fails validation.
pub async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<Config> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(path_ref).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    parse(&content, &EnvExpander::from_process_env(), path_ref)
}

/// Parses config text that was read from `config_path`.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML for a [`Config`] or fails validation.
pub fn parse(content: &str, env: &EnvExpander<'_>, config_path: &Path) -> eyre::Result<Config> {
    let mut config: Config = toml::from_str(content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        config_path.display()
    ))?;
    config.substitute_env(env);
    finalize(&mut config, config_path);
    validate(&config)?;
    Ok(config)
}

fn finalize(config: &mut Config, config_path: &Path) {
    config.web_path_prefix = normalize_web_path_prefix(&config.web_path_prefix);

    // A placeholder for an unset variable leaves the secret empty
    if config
        .state_secret
        .as_ref()
        .is_some_and(|secret| secret.expose_secret().is_empty())
    {
        config.state_secret = None;
    }

    if let Some(ref mut tls) = config.tls {
        tls.cert_path = resolve_config_relative_paths(config_path, &tls.cert_path);
        tls.key_path = resolve_config_relative_paths(config_path, &tls.key_path);
    }

    let trust_sources =
        core::iter::once(&mut config.idp_ca).chain(config.clusters.iter_mut().map(|c| &mut c.ca));
    for source in trust_sources {
        if let TrustSource::File(ref mut path) = *source {
            *path = resolve_config_relative_paths(config_path, path);
        }
    }
}

fn is_valid_cluster_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-'))
}

fn validate(config: &Config) -> eyre::Result<()> {
    config
        .listen
        .parse::<SocketAddr>()
        .wrap_err(format!("Invalid listen address: {}", config.listen))?;

    ensure!(
        config.upstream_timeout_secs > 0,
        "upstream_timeout_secs must be at least 1"
    );

    ensure!(
        !config.clusters.is_empty(),
        "At least one cluster must be configured"
    );

    let mut seen = HashSet::new();
    for cluster in &config.clusters {
        if !is_valid_cluster_name(&cluster.name) {
            bail!(
                "Invalid cluster name {:?}: only letters, digits and '.', '_', '~', '-' are allowed",
                cluster.name
            );
        }
        if !seen.insert(cluster.name.as_str()) {
            bail!("Duplicate cluster name: {}", cluster.name);
        }
        ensure!(
            cluster.dev_mode || !cluster.issuer.is_empty(),
            "Cluster {} has no issuer configured",
            cluster.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, fs, path::PathBuf};

    use secrecy::ExposeSecret as _;

    use super::*;
    use crate::config::TlsConfig;

    const MINIMAL: &str = r#"
        [[clusters]]
        name = "prod"
        issuer = "https://dex.example.com"
        client_id = "kubegate"
        client_secret = "s3cret"
        redirect_uri = "http://127.0.0.1:5555/callback/prod"
        k8s_master_uri = "https://prod.k8s.example.com:6443"
    "#;

    fn no_env() -> EnvExpander<'static> {
        EnvExpander::with_lookup(|_| None)
    }

    fn config_path() -> PathBuf {
        PathBuf::from("/etc/kubegate/kubegate.toml")
    }

    #[tokio::test]
    async fn load_broker_config_file() {
        let tmp = env::temp_dir().join("kubegate_test_config.toml");
        fs::write(&tmp, MINIMAL).unwrap();
        let cfg = load(&tmp).await.unwrap();
        assert_eq!(cfg.listen, "127.0.0.1:5555");
        assert_eq!(cfg.web_path_prefix, "/");
        assert_eq!(cfg.upstream_timeout_secs, 5);
        let cluster = cfg.cluster("prod").unwrap();
        assert_eq!(cluster.client_secret.expose_secret(), "s3cret");
        assert_eq!(cluster.namespace, "default");
        assert_eq!(cluster.ca, TrustSource::System);
        assert!(!cluster.dev_mode, "dev mode is off by default");
    }

    #[tokio::test]
    async fn load_broker_config_missing_file() {
        let tmp = env::temp_dir().join("kubegate_does_not_exist.toml");
        let res = load(&tmp).await;
        assert!(res.is_err(), "Expected error for missing file");
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let res = parse("not valid toml", &no_env(), &config_path());
        assert!(res.is_err(), "Expected error for invalid TOML");
    }

    #[test]
    fn placeholders_are_expanded_from_env() {
        let vars = HashMap::from([("SECRET", "from-env")]);
        let env = EnvExpander::with_lookup(|name| vars.get(name).map(ToString::to_string));
        let cfg = parse(
            &MINIMAL.replace("s3cret", "${SECRET}"),
            &env,
            &config_path(),
        )
        .unwrap();
        assert_eq!(cfg.clusters[0].client_secret.expose_secret(), "from-env");
    }

    #[test]
    fn prefix_and_relative_paths_are_normalized() {
        let toml_str = format!(
            r#"
            web_path_prefix = "kube"
            [tls]
            cert_path = "tls/cert.pem"
            key_path = "/abs/key.pem"
            [idp_ca]
            pem_file = "./idp.pem"
            {MINIMAL}
            [clusters.ca]
            pem_file = "ca/prod.pem"
            "#
        );
        let cfg = parse(&toml_str, &no_env(), &config_path()).unwrap();
        assert_eq!(cfg.web_path_prefix, "/kube/");
        assert_eq!(
            cfg.tls,
            Some(TlsConfig {
                cert_path: PathBuf::from("/etc/kubegate/tls/cert.pem"),
                key_path: PathBuf::from("/abs/key.pem"),
            })
        );
        assert_eq!(
            cfg.idp_ca,
            TrustSource::File(PathBuf::from("/etc/kubegate/idp.pem"))
        );
        assert_eq!(
            cfg.clusters[0].ca,
            TrustSource::File(PathBuf::from("/etc/kubegate/ca/prod.pem"))
        );
    }

    #[test]
    fn unset_state_secret_placeholder_is_dropped() {
        let content = format!("state_secret = \"${{KUBEGATE_UNSET_SECRET}}\"\n{MINIMAL}");
        let cfg = parse(&content, &no_env(), &config_path()).unwrap();
        assert!(cfg.state_secret.is_none(), "empty secret must not be used");
    }

    #[test]
    fn zero_upstream_timeout_is_rejected() {
        let toml_str = format!("upstream_timeout_secs = 0\n{MINIMAL}");
        let err = parse(&toml_str, &no_env(), &config_path()).unwrap_err();
        assert!(
            err.to_string().contains("upstream_timeout_secs"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn empty_cluster_list_is_rejected() {
        let res = parse("clusters = []", &no_env(), &config_path());
        assert!(res.is_err(), "Expected error without clusters");
    }

    #[test]
    fn duplicate_cluster_names_are_rejected() {
        let toml_str = format!("{MINIMAL}\n{MINIMAL}");
        let err = parse(&toml_str, &no_env(), &config_path()).unwrap_err();
        assert!(
            err.to_string().contains("Duplicate cluster name"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn cluster_names_must_be_url_safe() {
        for name in ["", "has space", "a/b", "ünïcode", "q?x"] {
            let toml_str = MINIMAL.replace("name = \"prod\"", &format!("name = {name:?}"));
            assert!(
                parse(&toml_str, &no_env(), &config_path()).is_err(),
                "name {name:?} should be rejected"
            );
        }
        for name in ["prod", "eu-west.1", "a_b~c"] {
            let toml_str = MINIMAL.replace("name = \"prod\"", &format!("name = {name:?}"));
            assert!(
                parse(&toml_str, &no_env(), &config_path()).is_ok(),
                "name {name:?} should be accepted"
            );
        }
    }

    #[test]
    fn invalid_listen_address_is_rejected() {
        let toml_str = format!("listen = \"not-an-address\"\n{MINIMAL}");
        assert!(
            parse(&toml_str, &no_env(), &config_path()).is_err(),
            "Expected error for invalid listen address"
        );
    }

    #[test]
    fn conflicting_ca_sources_are_rejected() {
        let toml_str = format!("{MINIMAL}\n[clusters.ca]\npem = \"x\"\nuri = \"https://ca\"");
        assert!(
            parse(&toml_str, &no_env(), &config_path()).is_err(),
            "Expected error for conflicting CA sources"
        );
    }

    #[tokio::test]
    async fn load_example_config() {
        let temp_file = env::temp_dir().join("kubegate_test_example_config.toml");
        fs::copy("../docs/examples/example_config.toml", &temp_file).unwrap();
        let cfg = load(&temp_file)
            .await
            .expect("Failed to load example_config.toml");
        assert_eq!(cfg.clusters.len(), 2);
        assert!(
            cfg.clusters.iter().any(|c| c.dev_mode),
            "example ships a dev mode cluster"
        );
    }
}
