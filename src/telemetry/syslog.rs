//! Syslog integration for audit logging.
//!
//! All audit events are written to syslog with the `TORLEASH` tag. Leak
//! events are logged at warning severity, routine events at info.

use std::sync::Mutex;

use syslog::{Facility, Formatter3164};
use tracing::{debug, error};

use super::error::TelemetryError;
use super::events::{AuditEvent, Severity};

/// Syslog tag for all audit events.
pub const SYSLOG_TAG: &str = "TORLEASH";

/// Audit logger that writes structured JSON events to syslog.
///
/// Uses interior mutability (Mutex) to allow logging from shared references;
/// the tracer holds the logger behind an `Arc`.
pub struct AuditLogger {
    /// Syslog writer protected by a mutex for interior mutability.
    /// None indicates a null logger (for testing).
    writer: Option<Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>>,
}

impl AuditLogger {
    /// Create a new audit logger connected to syslog.
    ///
    /// Uses Unix socket connection to the local syslog daemon.
    pub fn new() -> Result<Self, TelemetryError> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_USER,
            hostname: None,
            process: SYSLOG_TAG.to_string(),
            pid: std::process::id(),
        };

        let writer = syslog::unix(formatter).map_err(|e| {
            TelemetryError::SyslogConnection(format!("Failed to connect to syslog: {}", e))
        })?;

        debug!("Connected to syslog with tag '{}'", SYSLOG_TAG);
        Ok(Self {
            writer: Some(Mutex::new(writer)),
        })
    }

    /// Create a null audit logger that discards all events.
    ///
    /// Useful for testing and for hosts without a syslog daemon.
    pub fn new_null() -> Self {
        Self { writer: None }
    }

    /// Log an audit event to syslog at its own severity.
    ///
    /// The event is serialized to JSON with an ISO8601 timestamp.
    /// If this is a null logger, the event is silently discarded.
    pub fn log(&self, event: AuditEvent) {
        let Some(ref writer) = self.writer else {
            // Null logger - discard silently
            return;
        };

        let severity = event.severity();
        let timestamped = event.with_timestamp();

        match serde_json::to_string(&timestamped) {
            Ok(json) => {
                match writer.lock() {
                    Ok(mut writer) => {
                        let result = match severity {
                            Severity::Info => writer.info(&json),
                            Severity::Warning => writer.warning(&json),
                        };
                        if let Err(e) = result {
                            error!("Failed to write to syslog: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to acquire syslog writer lock: {}", e);
                    }
                }
                debug!("Logged audit event: {}", json);
            }
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
            }
        }
    }

    /// Check if this is a null logger.
    pub fn is_null(&self) -> bool {
        self.writer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: Logging tests that touch a real syslog daemon are gated; the
    // null logger path is exercised unconditionally.

    #[test]
    fn test_syslog_tag() {
        assert_eq!(SYSLOG_TAG, "TORLEASH");
    }

    #[test]
    fn test_null_logger_discards_events() {
        let logger = AuditLogger::new_null();
        assert!(logger.is_null());

        // Should not panic
        logger.log(AuditEvent::LeakBlocked {
            dest: "93.184.216.34:80".to_string(),
        });
    }

    // Integration test - requires syslog daemon
    #[test]
    #[ignore = "Requires running syslog daemon"]
    fn test_logger_creation() {
        let logger = AuditLogger::new();
        assert!(logger.is_ok());
    }
}
