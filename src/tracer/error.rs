//! Error types for the tracing engine.
//!
//! Everything here is fatal for the run: once register or wait state is in
//! doubt the tracer cannot safely continue, and the supervised process group
//! is killed before the error propagates. Decode problems are not errors -
//! they produce an empty attempt which the policy engine fails closed on.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use thiserror::Error;

/// Errors that abort a supervision run.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The target program could not be launched.
    #[error("Failed to launch target program: {0}")]
    Launch(#[source] std::io::Error),

    /// Waiting for a tracee stop failed.
    #[error("Failed to wait for tracee: {0}")]
    Wait(#[source] Errno),

    /// The child did not arrive at the expected post-exec trap stop.
    #[error("Unexpected initial stop for pid {pid}: {status:?}")]
    BadInitialStop {
        /// The child PID.
        pid: Pid,
        /// The wait status actually observed.
        status: WaitStatus,
    },

    /// Trace options could not be set on the child.
    #[error("Failed to set trace options on pid {pid}: {source}")]
    SetOptions {
        /// The child PID.
        pid: Pid,
        /// The underlying errno.
        source: Errno,
    },

    /// A stopped tracee could not be resumed.
    #[error("Failed to resume tracee {pid}: {source}")]
    Resume {
        /// The tracee PID.
        pid: Pid,
        /// The underlying errno.
        source: Errno,
    },

    /// The tracee's register set could not be read.
    #[error("Failed to read registers of tracee {pid}: {source}")]
    RegisterRead {
        /// The tracee PID.
        pid: Pid,
        /// The underlying errno.
        source: Errno,
    },

    /// The tracee's register set could not be written back.
    #[error("Failed to write registers of tracee {pid}: {source}")]
    RegisterWrite {
        /// The tracee PID.
        pid: Pid,
        /// The underlying errno.
        source: Errno,
    },

    /// The tracee vanished mid-nullification.
    ///
    /// A half-completed nullification could leave the network call partially
    /// executed, which is unacceptable for an enforcement mechanism.
    #[error("Tracee {pid} was lost while a connect was being nullified: {status:?}")]
    TraceeLost {
        /// The tracee PID.
        pid: Pid,
        /// The wait status observed instead of the expected exit stop.
        status: WaitStatus,
    },

    /// The kill signal could not be delivered to the supervised group.
    #[error("Failed to deliver {signal:?} to supervised process group {pgid}: {source}")]
    KillDelivery {
        /// Process group the signal was aimed at.
        pgid: Pid,
        /// The signal that failed to deliver.
        signal: Signal,
        /// The underlying errno.
        source: Errno,
    },
}
