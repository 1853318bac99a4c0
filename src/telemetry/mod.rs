//! Telemetry and audit logging for torleash.
//!
//! This module provides structured logging to syslog with the `TORLEASH`
//! tag. All enforcement decisions are logged for audit trails.
//!
//! # Architecture
//!
//! - **Audit logging** (syslog): enforcement events go to syslog, never to
//!   the supervised program's stdout/stderr
//! - **Debug logging** (tracing): development logs go to stderr via `tracing`
//! - These are completely separate concerns
//!
//! The logger is constructed once at startup and handed to the tracer as an
//! explicit dependency; there is no process-wide global.
//!
//! # Event Format
//!
//! Events are logged as JSON with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-08-04T14:32:01Z","event":"leak_blocked","dest":"93.184.216.34:80"}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AllowReason, AuditEvent, Severity};
pub use syslog::{AuditLogger, SYSLOG_TAG};
