//! Audit event types for structured logging.
//!
//! These events are logged to syslog with the `TORLEASH` tag for audit
//! trails; each one carries the resolved `ip:port` it concerns.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Audit events for enforcement logging.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Supervision started - child launched under trace.
    TraceStart {
        /// Program being supervised.
        program: String,
        /// Process ID of the supervised child.
        pid: u32,
    },

    /// Supervision ended - child exited or was killed.
    TraceEnd {
        /// Program that was supervised.
        program: String,
        /// Exit code propagated to the caller.
        exit_code: i32,
    },

    /// Connection permitted.
    ConnectAllowed {
        /// Destination as `ip:port` (or a local socket path).
        dest: String,
        /// Reason for allowing.
        reason: AllowReason,
    },

    /// Proxy leak detected and permitted (log-leaks mode).
    LeakLogged {
        /// Offending destination as `ip:port`.
        dest: String,
    },

    /// Proxy leak detected; the syscall was nullified.
    LeakBlocked {
        /// Offending destination as `ip:port`.
        dest: String,
    },

    /// Proxy leak detected; the supervised program was killed.
    LeakKilled {
        /// Offending destination as `ip:port`.
        dest: String,
    },
}

/// Reasons for permitting a connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// Destination is the configured proxy endpoint.
    ProxyEndpoint,
    /// Destination matched the allow-list.
    AllowList,
}

/// Syslog severity for an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine event.
    Info,
    /// A proxy leak occurred.
    Warning,
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }

    /// Syslog severity this event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            AuditEvent::TraceStart { .. }
            | AuditEvent::TraceEnd { .. }
            | AuditEvent::ConnectAllowed { .. } => Severity::Info,
            AuditEvent::LeakLogged { .. }
            | AuditEvent::LeakBlocked { .. }
            | AuditEvent::LeakKilled { .. } => Severity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_start_serialization() {
        let event = AuditEvent::TraceStart {
            program: "curl".to_string(),
            pid: 12345,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"trace_start\""));
        assert!(json.contains("\"program\":\"curl\""));
        assert!(json.contains("\"pid\":12345"));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_connect_allowed_serialization() {
        let event = AuditEvent::ConnectAllowed {
            dest: "127.0.0.1:9050".to_string(),
            reason: AllowReason::ProxyEndpoint,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"connect_allowed\""));
        assert!(json.contains("\"dest\":\"127.0.0.1:9050\""));
        assert!(json.contains("\"reason\":\"proxy_endpoint\""));
    }

    #[test]
    fn test_leak_blocked_serialization() {
        let event = AuditEvent::LeakBlocked {
            dest: "93.184.216.34:80".to_string(),
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"leak_blocked\""));
        assert!(json.contains("\"dest\":\"93.184.216.34:80\""));
    }

    #[test]
    fn test_leak_events_are_warnings() {
        let dest = "93.184.216.34:80".to_string();
        assert_eq!(
            AuditEvent::LeakLogged { dest: dest.clone() }.severity(),
            Severity::Warning
        );
        assert_eq!(
            AuditEvent::LeakBlocked { dest: dest.clone() }.severity(),
            Severity::Warning
        );
        assert_eq!(
            AuditEvent::LeakKilled { dest }.severity(),
            Severity::Warning
        );
    }

    #[test]
    fn test_routine_events_are_info() {
        let event = AuditEvent::ConnectAllowed {
            dest: "127.0.0.1:9050".to_string(),
            reason: AllowReason::AllowList,
        };
        assert_eq!(event.severity(), Severity::Info);
    }
}
