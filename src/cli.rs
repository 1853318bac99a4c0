//! Command-line interface definitions for torleash.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Force a program's network egress through a SOCKS proxy.
///
/// torleash runs the target program under ptrace and inspects every
/// `connect` syscall before it completes. Connections to the configured
/// proxy endpoint (or to allow-listed local sockets) proceed; any other
/// destination is a proxy leak and is logged, blocked, or fatal to the
/// program depending on the selected policy.
#[derive(Parser, Debug)]
#[command(name = "torleash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Program to launch and supervise.
    pub program: String,

    /// Arguments to pass to the program.
    ///
    /// All arguments after the program name are passed through to the
    /// supervised program without modification.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// SOCKS proxy endpoint the program must connect through.
    ///
    /// Overrides the configured endpoint. The TOR_SOCKS_HOST and
    /// TOR_SOCKS_PORT environment variables override the host and port
    /// halves independently unless --no-env is given.
    #[arg(short = 's', long = "socks", value_name = "HOST:PORT")]
    pub socks: Option<String>,

    /// Kill the program on a proxy leak instead of blocking the syscall.
    #[arg(long = "kill")]
    pub kill: bool,

    /// Allow proxy leaks but log every one that occurs.
    ///
    /// Takes precedence over --kill when both are given.
    #[arg(long = "log-leaks")]
    pub log_leaks: bool,

    /// Additional allow-listed endpoint or socket path (repeatable).
    ///
    /// Destinations matching an entry exactly are exempt from proxy
    /// enforcement (e.g. a local name-service control socket).
    #[arg(short = 'a', long = "allow", value_name = "ENDPOINT")]
    pub allow: Vec<String>,

    /// Path to additional config file.
    ///
    /// Merged on top of the system and user configs, giving it the highest
    /// file priority (CLI flags still win).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Ignore the TOR_SOCKS_HOST and TOR_SOCKS_PORT environment variables.
    #[arg(long = "no-env")]
    pub no_env: bool,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
