//! `${NAME}` placeholder expansion for configuration values.
//!
//! Every string leaf of the configuration is visited through [`SubstituteEnv`].
//! The implementations for the config structs destructure them exhaustively, so adding
//! a field without deciding whether it gets expanded is a compile error.

use alloc::sync::Arc;
use std::{env, path::PathBuf, sync::LazyLock};

use regex::{Captures, Regex};
use secrecy::{ExposeSecret as _, SecretString};

use crate::{
    config::{Cluster, Config, TlsConfig},
    trust::TrustSource,
};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_-]+)\}").expect("placeholder pattern is a valid regex")
});

/// Expands `${NAME}` placeholders using a variable lookup.
///
/// Unset variables expand to the empty string. Expansion is a single left-to-right
/// pass; values inserted from the environment are not expanded again.
pub struct EnvExpander<'env> {
    lookup: Box<dyn Fn(&str) -> Option<String> + 'env>,
}

impl<'env> EnvExpander<'env> {
    /// Expander backed by the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::with_lookup(|name| env::var(name).ok())
    }

    /// Expander backed by an arbitrary lookup, e.g. a map in tests.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'env) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// Expands every placeholder in `value`.
    #[must_use]
    pub fn expand(&self, value: &str) -> String {
        PLACEHOLDER
            .replace_all(value, |caps: &Captures<'_>| {
                let name = caps.get(1).map_or("", |m| m.as_str());
                (self.lookup)(name).unwrap_or_default()
            })
            .into_owned()
    }
}

/// Rewrites every string-typed field in place, leaving other fields untouched.
pub trait SubstituteEnv {
    fn substitute_env(&mut self, env: &EnvExpander<'_>);
}

impl SubstituteEnv for String {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        *self = env.expand(self);
    }
}

impl SubstituteEnv for PathBuf {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        if let Some(path) = self.to_str() {
            *self = Self::from(env.expand(path));
        }
    }
}

impl SubstituteEnv for Arc<SecretString> {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        let expanded = env.expand(self.expose_secret());
        *self = Self::new(SecretString::from(expanded));
    }
}

impl<T: SubstituteEnv> SubstituteEnv for Option<T> {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        if let Some(inner) = self.as_mut() {
            inner.substitute_env(env);
        }
    }
}

impl<T: SubstituteEnv> SubstituteEnv for Vec<T> {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        for item in self.iter_mut() {
            item.substitute_env(env);
        }
    }
}

impl SubstituteEnv for TrustSource {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        match *self {
            Self::Inline(ref mut pem) => pem.substitute_env(env),
            Self::File(ref mut path) => path.substitute_env(env),
            Self::Remote(ref mut uri) => uri.substitute_env(env),
            Self::System => {}
        }
        // A placeholder for an unset variable leaves the source empty
        if self.is_empty() {
            *self = Self::System;
        }
    }
}

impl SubstituteEnv for TlsConfig {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        let Self {
            cert_path,
            key_path,
        } = self;
        cert_path.substitute_env(env);
        key_path.substitute_env(env);
    }
}

impl SubstituteEnv for Cluster {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        let Self {
            name,
            short_description,
            description,
            issuer,
            client_id,
            client_secret,
            redirect_uri,
            scopes,
            ca,
            k8s_master_uri,
            namespace,
            static_context_name: _,
            dev_mode: _,
            logo_uri,
            kubectl_version,
        } = self;
        name.substitute_env(env);
        short_description.substitute_env(env);
        description.substitute_env(env);
        issuer.substitute_env(env);
        client_id.substitute_env(env);
        client_secret.substitute_env(env);
        redirect_uri.substitute_env(env);
        scopes.substitute_env(env);
        ca.substitute_env(env);
        k8s_master_uri.substitute_env(env);
        namespace.substitute_env(env);
        logo_uri.substitute_env(env);
        kubectl_version.substitute_env(env);
    }
}

impl SubstituteEnv for Config {
    fn substitute_env(&mut self, env: &EnvExpander<'_>) {
        let Self {
            listen,
            web_path_prefix,
            debug: _,
            logo_uri,
            kubectl_version,
            upstream_timeout_secs: _,
            state_secret,
            tls,
            idp_ca,
            clusters,
        } = self;
        listen.substitute_env(env);
        web_path_prefix.substitute_env(env);
        logo_uri.substitute_env(env);
        kubectl_version.substitute_env(env);
        state_secret.substitute_env(env);
        tls.substitute_env(env);
        idp_ca.substitute_env(env);
        clusters.substitute_env(env);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn expander(vars: &[(&str, &str)]) -> EnvExpander<'static> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvExpander::with_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn expands_placeholders() {
        let cases: &[(&str, &[(&str, &str)], &str)] = &[
            ("simple text", &[], "simple text"),
            ("value is ${VAR1}", &[("VAR1", "test")], "value is test"),
            (
                "${VAR1} and ${VAR2}",
                &[("VAR1", "first"), ("VAR2", "second")],
                "first and second",
            ),
            ("${VAR-NAME_123}", &[("VAR-NAME_123", "value")], "value"),
            ("value is ${MISSING}", &[], "value is "),
            ("${VAR1}${VAR2}", &[("VAR1", "a"), ("VAR2", "b")], "ab"),
            ("${V}", &[("V", "x")], "x"),
            ("${V}", &[], ""),
        ];
        for &(input, vars, expected) in cases {
            assert_eq!(expander(vars).expand(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn expanded_values_are_not_expanded_again() {
        let env = expander(&[("OUTER", "${INNER}"), ("INNER", "nope")]);
        assert_eq!(env.expand("${OUTER}"), "${INNER}");
    }

    #[test]
    fn recurses_into_nested_config() {
        let mut config: Config = toml::from_str(
            r#"
            listen = "${HOST}:5555"
            upstream_timeout_secs = 7
            debug = true

            [[clusters]]
            name = "${TEST_VAR}-cluster"
            issuer = "https://${TEST_VAR}.example.com"
            client_id = "client-${TEST_VAR}"
            client_secret = "secret-${TEST_VAR}"
            redirect_uri = "http://localhost:5555/callback"
            k8s_master_uri = "https://k8s.example.com"
            scopes = ["openid", "${EXTRA_SCOPE}"]
            static_context_name = true

            [clusters.ca]
            pem_file = "/etc/${TEST_VAR}/ca.pem"
            "#,
        )
        .unwrap();

        config.substitute_env(&expander(&[
            ("TEST_VAR", "test_value"),
            ("HOST", "0.0.0.0"),
            ("EXTRA_SCOPE", "groups"),
        ]));

        assert_eq!(config.listen, "0.0.0.0:5555");
        assert_eq!(config.upstream_timeout_secs, 7, "non-string fields are untouched");
        assert!(config.debug, "non-string fields are untouched");
        let cluster = &config.clusters[0];
        assert_eq!(cluster.name, "test_value-cluster");
        assert_eq!(cluster.issuer, "https://test_value.example.com");
        assert_eq!(cluster.client_id, "client-test_value");
        assert_eq!(cluster.client_secret.expose_secret(), "secret-test_value");
        assert_eq!(cluster.scopes, ["openid", "groups"]);
        assert!(cluster.static_context_name, "non-string fields are untouched");
        assert_eq!(
            cluster.ca,
            TrustSource::File(PathBuf::from("/etc/test_value/ca.pem"))
        );
    }

    #[test]
    fn trust_source_of_unset_variable_falls_back_to_system() {
        let mut source = TrustSource::Inline("${UNSET_CA}".to_string());
        source.substitute_env(&expander(&[]));
        assert_eq!(source, TrustSource::System);
    }
}
