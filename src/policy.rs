//! Leak policy evaluation engine.
//!
//! This module decides what happens to a single decoded connection attempt.
//! It is pure: the decision depends only on the attempt and the resolved
//! configuration captured at startup.
//!
//! # Policy Evaluation Order
//!
//! 1. Destination equals the configured proxy endpoint → allow
//! 2. Destination address matches an allow-list entry exactly → allow
//! 3. Leak: log-leaks mode → log and let it through
//! 4. Leak: kill mode → kill the supervised program
//! 5. Leak: otherwise → nullify the syscall in place (default)
//!
//! Log-leaks takes precedence over kill, and kill over block. An attempt
//! whose address could not be decoded is empty and matches nothing, so it
//! falls through to the leak branch — decode failures fail closed.

use std::fmt;

use crate::config::EnforcerConfig;

/// Destination of one `connect` attempt, as decoded from the tracee.
///
/// `ip` is a dotted-decimal or textual IP, or a local socket path. `port`
/// is empty for local sockets and for attempts that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// Destination address, or an empty string when undecodable.
    pub ip: String,
    /// Destination port in host byte order, or an empty string.
    pub port: String,
}

impl ConnectionAttempt {
    /// Render the attempt as `ip:port` for endpoint comparison and logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for ConnectionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// What to do with one `connect` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the syscall proceed.
    Allow,
    /// Let the syscall proceed but record the leak.
    LogLeak,
    /// Kill the supervised program.
    KillChild,
    /// Nullify the syscall so it fails without killing the program.
    BlockSyscall,
}

/// Policy engine for connection attempts.
///
/// Captures the relevant configuration once; evaluation is pure and total.
pub struct PolicyEngine {
    socks_endpoint: String,
    allow_list: Vec<String>,
    log_leaks: bool,
    kill_on_leak: bool,
}

impl PolicyEngine {
    /// Create a policy engine from the resolved configuration.
    pub fn from_config(config: &EnforcerConfig) -> Self {
        Self {
            socks_endpoint: config.socks_endpoint.clone(),
            allow_list: config.allow_list.clone(),
            log_leaks: config.log_leaks,
            kill_on_leak: config.kill_on_leak,
        }
    }

    /// Decide what happens to a connection attempt.
    pub fn decide(&self, attempt: &ConnectionAttempt) -> Decision {
        if self.matches_proxy(attempt) || self.matches_allow_list(attempt) {
            return Decision::Allow;
        }
        if self.log_leaks {
            return Decision::LogLeak;
        }
        if self.kill_on_leak {
            return Decision::KillChild;
        }
        Decision::BlockSyscall
    }

    /// Whether the attempt targets the configured proxy endpoint verbatim.
    pub fn matches_proxy(&self, attempt: &ConnectionAttempt) -> bool {
        !attempt.ip.is_empty() && attempt.endpoint() == self.socks_endpoint
    }

    /// Whether the attempt's address exactly matches an allow-list entry.
    fn matches_allow_list(&self, attempt: &ConnectionAttempt) -> bool {
        !attempt.ip.is_empty() && self.allow_list.iter().any(|entry| *entry == attempt.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(log_leaks: bool, kill_on_leak: bool) -> PolicyEngine {
        PolicyEngine::from_config(&EnforcerConfig {
            socks_endpoint: "127.0.0.1:9050".to_string(),
            allow_list: vec!["/var/run/nscd/socket".to_string()],
            log_leaks,
            kill_on_leak,
        })
    }

    fn attempt(ip: &str, port: &str) -> ConnectionAttempt {
        ConnectionAttempt {
            ip: ip.to_string(),
            port: port.to_string(),
        }
    }

    #[test]
    fn test_proxy_endpoint_is_allowed() {
        for (log, kill) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(
                engine(log, kill).decide(&attempt("127.0.0.1", "9050")),
                Decision::Allow
            );
        }
    }

    #[test]
    fn test_allow_listed_socket_path_is_allowed() {
        for (log, kill) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(
                engine(log, kill).decide(&attempt("/var/run/nscd/socket", "")),
                Decision::Allow
            );
        }
    }

    #[test]
    fn test_leak_precedence_over_flag_combinations() {
        let leak = attempt("93.184.216.34", "80");

        assert_eq!(engine(false, false).decide(&leak), Decision::BlockSyscall);
        assert_eq!(engine(false, true).decide(&leak), Decision::KillChild);
        assert_eq!(engine(true, false).decide(&leak), Decision::LogLeak);
        // Log-leaks wins over kill when both are set
        assert_eq!(engine(true, true).decide(&leak), Decision::LogLeak);
    }

    #[test]
    fn test_wrong_port_on_proxy_host_is_a_leak() {
        assert_eq!(
            engine(false, false).decide(&attempt("127.0.0.1", "9150")),
            Decision::BlockSyscall
        );
    }

    #[test]
    fn test_empty_attempt_is_never_allowed() {
        let empty = attempt("", "");
        assert_eq!(engine(false, false).decide(&empty), Decision::BlockSyscall);
        assert_eq!(engine(false, true).decide(&empty), Decision::KillChild);
        assert_eq!(engine(true, false).decide(&empty), Decision::LogLeak);
    }

    #[test]
    fn test_empty_ip_does_not_match_empty_allow_entry() {
        let engine = PolicyEngine::from_config(&EnforcerConfig {
            socks_endpoint: "127.0.0.1:9050".to_string(),
            allow_list: vec![String::new()],
            log_leaks: false,
            kill_on_leak: false,
        });
        assert_eq!(
            engine.decide(&attempt("", "")),
            Decision::BlockSyscall
        );
    }

    #[test]
    fn test_decision_is_deterministic() {
        let engine = engine(false, false);
        let a = attempt("10.1.2.3", "443");
        assert_eq!(engine.decide(&a), engine.decide(&a));
    }

    #[test]
    fn test_attempt_display() {
        assert_eq!(attempt("127.0.0.1", "9050").to_string(), "127.0.0.1:9050");
    }
}
