//! Configuration schema definitions.
//!
//! [`FileConfig`] is the on-disk TOML structure; files from the hierarchy
//! are deserialized into it and merged. [`EnforcerConfig`] is the resolved,
//! immutable configuration the tracer core consumes — it is built once at
//! startup and never mutated after the supervised program is launched.

use serde::{Deserialize, Serialize};

/// Default SOCKS proxy endpoint (a local Tor client).
pub const DEFAULT_SOCKS_ENDPOINT: &str = "127.0.0.1:9050";

/// Local name-service control socket, exempt from proxy enforcement.
pub const DEFAULT_NSCD_SOCKET: &str = "/var/run/nscd/socket";

/// Top-level on-disk configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    /// Proxy settings.
    #[serde(default)]
    pub proxy: ProxySection,

    /// Leak policy settings.
    #[serde(default)]
    pub policy: PolicySection,
}

impl FileConfig {
    /// Merge another file config into this one.
    ///
    /// Lists (the allow-list) are merged (appended).
    /// Scalars are overridden when the other config sets them.
    pub fn merge(&mut self, other: FileConfig) {
        self.proxy.merge(other.proxy);
        self.policy.merge(other.policy);
    }
}

/// Proxy endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProxySection {
    /// SOCKS proxy endpoint as `host:port`.
    #[serde(default)]
    pub endpoint: String,

    /// Whether TOR_SOCKS_HOST / TOR_SOCKS_PORT may override the endpoint.
    ///
    /// Unset means enabled.
    #[serde(default)]
    pub use_env: Option<bool>,
}

impl ProxySection {
    fn merge(&mut self, other: ProxySection) {
        if !other.endpoint.is_empty() {
            self.endpoint = other.endpoint;
        }
        if other.use_env.is_some() {
            self.use_env = other.use_env;
        }
    }
}

/// Leak policy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicySection {
    /// Allow proxy leaks but log every one that occurs.
    #[serde(default)]
    pub log_leaks: Option<bool>,

    /// Kill the supervised program on a proxy leak.
    #[serde(default)]
    pub kill_on_leak: Option<bool>,

    /// Endpoints and socket paths exempt from proxy enforcement.
    #[serde(default)]
    pub allow: Vec<String>,
}

impl PolicySection {
    fn merge(&mut self, other: PolicySection) {
        if other.log_leaks.is_some() {
            self.log_leaks = other.log_leaks;
        }
        if other.kill_on_leak.is_some() {
            self.kill_on_leak = other.kill_on_leak;
        }
        self.allow.extend(other.allow);
    }
}

/// Resolved configuration consumed by the tracer core.
///
/// Immutable for the lifetime of the process; the core never reads flags,
/// files, or environment variables itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// SOCKS proxy endpoint the supervised program must connect through.
    pub socks_endpoint: String,

    /// Endpoints and socket paths exempt from proxy enforcement.
    pub allow_list: Vec<String>,

    /// Allow proxy leaks but log every one that occurs.
    pub log_leaks: bool,

    /// Kill the supervised program on a proxy leak.
    pub kill_on_leak: bool,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            socks_endpoint: DEFAULT_SOCKS_ENDPOINT.to_string(),
            allow_list: vec![DEFAULT_NSCD_SOCKET.to_string()],
            log_leaks: false,
            kill_on_leak: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_config_is_empty() {
        let config = FileConfig::default();
        assert!(config.proxy.endpoint.is_empty());
        assert!(config.proxy.use_env.is_none());
        assert!(config.policy.log_leaks.is_none());
        assert!(config.policy.allow.is_empty());
    }

    #[test]
    fn test_file_config_merge_scalars() {
        let mut base = FileConfig::default();
        let override_config = FileConfig {
            proxy: ProxySection {
                endpoint: "10.0.0.1:9050".to_string(),
                use_env: Some(false),
            },
            policy: PolicySection {
                log_leaks: Some(true),
                kill_on_leak: None,
                allow: vec![],
            },
        };

        base.merge(override_config);

        assert_eq!(base.proxy.endpoint, "10.0.0.1:9050");
        assert_eq!(base.proxy.use_env, Some(false));
        assert_eq!(base.policy.log_leaks, Some(true));
        assert!(base.policy.kill_on_leak.is_none());
    }

    #[test]
    fn test_file_config_merge_keeps_unset_scalars() {
        let mut base = FileConfig {
            proxy: ProxySection {
                endpoint: "10.0.0.1:9050".to_string(),
                use_env: Some(true),
            },
            ..Default::default()
        };

        base.merge(FileConfig::default());

        // Empty override must not clobber the existing values
        assert_eq!(base.proxy.endpoint, "10.0.0.1:9050");
        assert_eq!(base.proxy.use_env, Some(true));
    }

    #[test]
    fn test_file_config_merge_lists() {
        let mut base = FileConfig {
            policy: PolicySection {
                allow: vec!["/var/run/nscd/socket".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        base.merge(FileConfig {
            policy: PolicySection {
                allow: vec!["127.0.0.1:53".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert_eq!(base.policy.allow.len(), 2);
        assert!(base.policy.allow.contains(&"127.0.0.1:53".to_string()));
        assert!(base.policy.allow.contains(&"/var/run/nscd/socket".to_string()));
    }

    #[test]
    fn test_file_config_deserialize() {
        let toml_str = r#"
            [proxy]
            endpoint = "127.0.0.1:9150"
            use_env = false

            [policy]
            log_leaks = true
            allow = ["/run/pdns/socket"]
        "#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.proxy.endpoint, "127.0.0.1:9150");
        assert_eq!(config.proxy.use_env, Some(false));
        assert_eq!(config.policy.log_leaks, Some(true));
        assert!(config.policy.allow.contains(&"/run/pdns/socket".to_string()));
    }

    #[test]
    fn test_enforcer_config_defaults() {
        let config = EnforcerConfig::default();
        assert_eq!(config.socks_endpoint, DEFAULT_SOCKS_ENDPOINT);
        assert!(config.allow_list.contains(&DEFAULT_NSCD_SOCKET.to_string()));
        assert!(!config.log_leaks);
        assert!(!config.kill_on_leak);
    }
}
