//! torleash: proxy-leak enforcement for a supervised process
//!
//! This is the main entry point for the torleash binary. It handles CLI
//! argument parsing, configuration loading, telemetry initialization, and
//! hands the assembled command to the supervisor.
//!
//! # I/O Architecture
//!
//! torleash wraps the target program without interfering with its
//! stdin/stdout/stderr:
//!
//! - **Audit logging**: goes to syslog (not stdout/stderr), so it never
//!   interferes with the supervised program
//! - **Debug logging**: goes to stderr via `tracing`, silent by default;
//!   raise with `-v`
//!
//! The process exit code is the supervised program's own exit code (or
//! 128 + signal when policy killed it); torleash's own failures exit
//! nonzero with an error on stderr.

use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use torleash::{
    cli::Cli,
    config::ConfigLoader,
    telemetry::{AuditEvent, AuditLogger},
    tracer::Supervisor,
};

fn main() -> Result<()> {
    // Parse CLI arguments first (before any other initialization)
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    // Audit logging is best-effort at startup: a host without a syslog
    // daemon still gets enforcement, just no audit trail
    let audit = match AuditLogger::new() {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            warn!("Audit logging disabled: {}", e);
            Arc::new(AuditLogger::new_null())
        }
    };

    // Resolve configuration from files, environment, and flags
    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;

    debug!("Resolved configuration: {:?}", config);
    info!(
        "Enforcing proxy endpoint {} for '{}'",
        config.socks_endpoint, cli.program
    );

    let mut command = Command::new(&cli.program);
    command.args(&cli.args);

    let supervisor = Supervisor::new(&config, audit.clone());
    let outcome = supervisor
        .run(command)
        .with_context(|| format!("Failed while supervising '{}'", cli.program))?;

    audit.log(AuditEvent::TraceEnd {
        program: cli.program.clone(),
        exit_code: outcome.exit_code(),
    });

    std::process::exit(outcome.exit_code());
}

/// Initialize the tracing subscriber for debug/development logging.
///
/// This is separate from the audit telemetry which goes to syslog.
///
/// # Verbosity Levels
/// - 0 (default): Only warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
