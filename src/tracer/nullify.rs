//! In-place nullification of a blocked `connect` syscall.
//!
//! Given a tracee stopped at the *entry* of a `connect` that must not be
//! allowed, the sequence below makes the call a no-op failure without
//! killing the process:
//!
//! 1. resume the tracee toward its next syscall stop - the kernel already
//!    holds the entry stop, so the next one is the matching *exit* stop
//! 2. wait synchronously for that exit stop
//! 3. read the tracee's register set
//! 4. overwrite the outcome register with an invalid, out-of-range syscall
//!    number so the child observes the call failing
//! 5. write the modified register set back
//! 6. resume toward the next syscall stop; control returns to the
//!    dispatcher's main loop
//!
//! The tracee is stopped for the whole sequence, so no other event for the
//! same PID can interleave with it. Any failure along the way is fatal for
//! the run: a half-completed nullification could leave the network call
//! partially executed.

use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, trace};

use super::error::TraceError;
use super::regs;

/// Drive a tracee stopped at `connect` entry through the exit stop and
/// overwrite the outcome, leaving the tracee resumed toward its next
/// syscall stop.
pub(crate) fn nullify_connect(pid: Pid) -> Result<(), TraceError> {
    ptrace::syscall(pid, None::<Signal>).map_err(|source| TraceError::Resume { pid, source })?;

    let status = waitpid(pid, None).map_err(TraceError::Wait)?;
    if !matches!(status, WaitStatus::PtraceSyscall(stopped) if stopped == pid) {
        return Err(TraceError::TraceeLost { pid, status });
    }

    let mut syscall_regs = regs::read(pid)?;
    trace!(
        %pid,
        raw_return = syscall_regs.return_value(),
        "connect reached its exit stop"
    );

    syscall_regs.set_return_value(regs::INVALID_SYSCALL);
    regs::write(pid, &syscall_regs)?;

    ptrace::syscall(pid, None::<Signal>).map_err(|source| TraceError::Resume { pid, source })?;

    debug!(%pid, "connect nullified");
    Ok(())
}
