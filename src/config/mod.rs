//! Configuration for torleash.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (compiled into binary)
//! 2. System config: `/etc/torleash/config.toml`
//! 3. User config: `~/.config/torleash/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags
//! 6. `TOR_SOCKS_HOST` / `TOR_SOCKS_PORT` environment variables
//!
//! Lists (the allow-list) are **merged** (appended). Scalars (endpoint,
//! policy flags) are **overridden**. The result is a resolved
//! [`EnforcerConfig`] that never changes once the supervised program starts.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::{resolve_socks_endpoint, ConfigLoader, SYSTEM_CONFIG_PATH};
pub use schema::{EnforcerConfig, FileConfig, DEFAULT_NSCD_SOCKET, DEFAULT_SOCKS_ENDPOINT};
