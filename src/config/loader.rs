//! Configuration loading with hierarchy merging.
//!
//! Files are merged in order (system config, user config, `--config` file),
//! then CLI flags are applied, then the `TOR_SOCKS_HOST` / `TOR_SOCKS_PORT`
//! environment variables override the endpoint's host and port halves
//! independently. Missing hierarchy files are skipped; a missing `--config`
//! file is an error (it was requested explicitly).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::{EnforcerConfig, FileConfig};
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/torleash/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "torleash";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the proxy host.
pub const ENV_SOCKS_HOST: &str = "TOR_SOCKS_HOST";

/// Environment variable overriding the proxy port.
pub const ENV_SOCKS_PORT: &str = "TOR_SOCKS_PORT";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load and merge configuration from all sources into the resolved form.
    pub fn load(&self, cli: &Cli) -> Result<EnforcerConfig, ConfigError> {
        let mut file = FileConfig::default();

        if let Some(system_config) = self.load_file(&self.system_path)? {
            file.merge(system_config);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user_config) = self.load_file(&self.user_path)? {
            file.merge(user_config);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(extra_path) = &cli.config {
            match self.load_file(extra_path)? {
                Some(extra) => {
                    file.merge(extra);
                    debug!("Loaded additional config from {:?}", extra_path);
                }
                None => {
                    return Err(ConfigError::ReadError {
                        path: extra_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "config file not found",
                        ),
                    });
                }
            }
        }

        let mut resolved = EnforcerConfig::default();

        if !file.proxy.endpoint.is_empty() {
            resolved.socks_endpoint = file.proxy.endpoint.clone();
        }
        resolved.allow_list.extend(file.policy.allow.clone());
        if let Some(log_leaks) = file.policy.log_leaks {
            resolved.log_leaks = log_leaks;
        }
        if let Some(kill_on_leak) = file.policy.kill_on_leak {
            resolved.kill_on_leak = kill_on_leak;
        }

        // CLI flags beat every file source
        if let Some(socks) = &cli.socks {
            resolved.socks_endpoint = socks.clone();
        }
        resolved.allow_list.extend(cli.allow.iter().cloned());
        if cli.log_leaks {
            resolved.log_leaks = true;
        }
        if cli.kill {
            resolved.kill_on_leak = true;
        }

        // Env overrides are applied last, each half independently
        let use_env = file.proxy.use_env.unwrap_or(true) && !cli.no_env;
        if use_env {
            let host = std::env::var(ENV_SOCKS_HOST).unwrap_or_default();
            let port = std::env::var(ENV_SOCKS_PORT).unwrap_or_default();
            resolved.socks_endpoint = resolve_socks_endpoint(&resolved.socks_endpoint, &host, &port);
        }

        if !resolved.socks_endpoint.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "proxy.endpoint".to_string(),
                message: format!(
                    "expected host:port, got '{}'",
                    resolved.socks_endpoint
                ),
            });
        }

        Ok(resolved)
    }

    /// Load a single TOML file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<FileConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(config))
    }
}

/// Overlay env-provided host/port halves onto a `host:port` endpoint.
///
/// Whichever half is empty falls back to the corresponding half of the
/// configured endpoint; both empty leaves the endpoint unchanged.
pub fn resolve_socks_endpoint(socks: &str, host: &str, port: &str) -> String {
    let (cur_host, cur_port) = socks.split_once(':').unwrap_or((socks, ""));

    match (host.is_empty(), port.is_empty()) {
        (true, false) => format!("{cur_host}:{port}"),
        (false, true) => format!("{host}:{cur_port}"),
        (false, false) => format!("{host}:{port}"),
        (true, true) => socks.to_string(),
    }
}
