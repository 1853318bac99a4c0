//! Process tracing and leak enforcement for torleash.
//!
//! This module owns the supervised child. It launches the target program
//! with tracing requested, then drives the kernel's syscall-stop protocol:
//! every syscall the child (or any thread/child it spawns while traced)
//! makes produces an entry stop and an exit stop, and a stopped tracee only
//! runs again when the tracer resumes it.
//!
//! For each `connect` entry stop the dispatcher runs the
//! decode → decide → act pipeline: the destination is decoded from the raw
//! syscall arguments, the policy engine produces exactly one decision, and
//! exactly one terminal action is taken - resume unchanged, log and resume,
//! kill the process group, or nullify the syscall in place - before the
//! next event for that PID is processed. Every other stop is resumed
//! untouched (signal-delivery stops forward the signal).
//!
//! The tracer is a single synchronous thread. Register and memory access is
//! only valid while a tracee is stopped, and waiting for the next stop
//! blocks intentionally - the tracer must not race ahead of tracee state. A
//! `connect` that hangs stalls that tracee's exit stop indefinitely; no
//! timeout is imposed.

pub mod decode;
pub mod error;
mod nullify;
pub mod regs;
mod sockcalls;

use std::collections::HashMap;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::Arc;

use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{setpgid, Pid};
use tracing::{debug, info, warn};

use crate::config::EnforcerConfig;
use crate::policy::{Decision, PolicyEngine};
use crate::telemetry::{AllowReason, AuditEvent, AuditLogger};

use decode::{AddressDecoder, PtraceMemory};
pub use error::TraceError;

/// One observation of a traced syscall at its entry stop.
///
/// Transient: exists only for the duration of one dispatch iteration.
#[derive(Debug, Clone, Copy)]
pub struct SyscallEvent {
    /// Tracee that made the syscall.
    pub pid: Pid,
    /// Syscall number, as dispatched by the tracee.
    pub sysno: u64,
    /// The six raw argument words.
    pub args: [u64; 6],
}

/// How a supervision run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    /// The supervised program exited on its own with this code.
    Exited(i32),
    /// The supervised program was terminated by this signal (including a
    /// policy kill).
    Killed(Signal),
}

impl TraceOutcome {
    /// Exit code to propagate to the caller (128 + signal for kills).
    pub fn exit_code(&self) -> i32 {
        match self {
            TraceOutcome::Exited(code) => *code,
            TraceOutcome::Killed(signal) => 128 + *signal as i32,
        }
    }
}

/// What happened to a tracee during entry handling.
enum EntryOutcome {
    /// The tracee was resumed (or killed); its exit stop is still pending.
    AwaitingExit,
    /// Nullification consumed the exit stop; the next stop is an entry.
    SyscallComplete,
}

/// Supervises one child process and enforces the leak policy on it.
///
/// Owns the traced child exclusively for its whole lifetime; side effects
/// are confined to that single process group.
pub struct Supervisor {
    policy: PolicyEngine,
    decoder: AddressDecoder,
    audit: Arc<AuditLogger>,
}

impl Supervisor {
    /// Create a supervisor from the resolved configuration and an audit
    /// logging capability.
    pub fn new(config: &EnforcerConfig, audit: Arc<AuditLogger>) -> Self {
        Self {
            policy: PolicyEngine::from_config(config),
            decoder: AddressDecoder::default(),
            audit,
        }
    }

    /// Launch the target program under trace and supervise it to completion.
    ///
    /// The command's stdio wiring is left untouched (inherited by default).
    /// Returns the child's own exit status, or the forced-kill outcome when
    /// policy terminated it. Any tracer failure kills the supervised
    /// process group before the error is returned - a child must never be
    /// left running untraced.
    pub fn run(&self, mut command: Command) -> Result<TraceOutcome, TraceError> {
        let program = command.get_program().to_string_lossy().into_owned();

        // The child makes itself a process-group leader (so a policy kill
        // takes its helpers with it) and requests tracing before exec.
        unsafe {
            command.pre_exec(|| {
                setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                ptrace::traceme().map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(TraceError::Launch)?;
        let root = Pid::from_raw(child.id() as i32);
        info!(%root, program = %program, "supervising");
        self.audit.log(AuditEvent::TraceStart {
            program,
            pid: child.id(),
        });

        let outcome = self.dispatch_loop(root);
        if outcome.is_err() {
            // Tracer state is in doubt; do not leave the child untraced
            let _ = signal::killpg(root, Signal::SIGKILL);
            let _ = child.wait();
        }
        outcome
    }

    /// Drive the syscall-stop protocol until the root child is gone.
    fn dispatch_loop(&self, root: Pid) -> Result<TraceOutcome, TraceError> {
        // The exec of the freshly spawned child delivers the initial trap
        let status = waitpid(root, None).map_err(TraceError::Wait)?;
        if !matches!(status, WaitStatus::Stopped(_, Signal::SIGTRAP)) {
            return Err(TraceError::BadInitialStop { pid: root, status });
        }

        ptrace::setoptions(
            root,
            ptrace::Options::PTRACE_O_TRACESYSGOOD
                | ptrace::Options::PTRACE_O_TRACECLONE
                | ptrace::Options::PTRACE_O_TRACEFORK
                | ptrace::Options::PTRACE_O_TRACEVFORK
                | ptrace::Options::PTRACE_O_EXITKILL,
        )
        .map_err(|source| TraceError::SetOptions { pid: root, source })?;

        resume(root, None)?;

        // Whether each tracee is between an entry stop and its exit stop
        let mut in_syscall: HashMap<Pid, bool> = HashMap::new();

        loop {
            match waitpid(None::<Pid>, None).map_err(TraceError::Wait)? {
                WaitStatus::PtraceSyscall(pid) => {
                    let entering = {
                        let phase = in_syscall.entry(pid).or_insert(false);
                        *phase = !*phase;
                        *phase
                    };

                    if entering {
                        if let EntryOutcome::SyscallComplete = self.on_syscall_entry(pid, root)? {
                            in_syscall.insert(pid, false);
                        }
                    } else {
                        resume(pid, None)?;
                    }
                }
                WaitStatus::PtraceEvent(pid, _, _) => {
                    // Clone/fork notification; the new tracee shows up with
                    // its own stop and gets its own phase entry
                    resume(pid, None)?;
                }
                WaitStatus::Stopped(pid, sig) => {
                    let forward = match sig {
                        Signal::SIGTRAP | Signal::SIGSTOP => None,
                        other => Some(other),
                    };
                    resume(pid, forward)?;
                }
                WaitStatus::Exited(pid, code) => {
                    in_syscall.remove(&pid);
                    if pid == root {
                        debug!(%root, code, "supervised program exited");
                        return Ok(TraceOutcome::Exited(code));
                    }
                }
                WaitStatus::Signaled(pid, sig, _) => {
                    in_syscall.remove(&pid);
                    if pid == root {
                        debug!(%root, signal = ?sig, "supervised program terminated by signal");
                        return Ok(TraceOutcome::Killed(sig));
                    }
                }
                _ => {}
            }
        }
    }

    /// Handle one syscall-entry stop: run decode → decide → act for
    /// `connect`, resume everything else untouched.
    fn on_syscall_entry(&self, pid: Pid, root: Pid) -> Result<EntryOutcome, TraceError> {
        let syscall_regs = regs::read(pid)?;
        let sysno = syscall_regs.syscall_number();

        if sysno != libc::SYS_connect as u64 {
            if let Some(name) = sockcalls::socket_syscall_name(sysno) {
                debug!(%pid, syscall = name, "socket syscall");
            }
            resume(pid, None)?;
            return Ok(EntryOutcome::AwaitingExit);
        }

        let event = SyscallEvent {
            pid,
            sysno,
            args: syscall_regs.args(),
        };
        let attempt = self
            .decoder
            .decode(&PtraceMemory::new(pid), event.args[1], event.args[2]);

        match self.policy.decide(&attempt) {
            Decision::Allow => {
                let reason = if self.policy.matches_proxy(&attempt) {
                    AllowReason::ProxyEndpoint
                } else {
                    AllowReason::AllowList
                };
                info!("Connecting to {attempt}");
                self.audit.log(AuditEvent::ConnectAllowed {
                    dest: attempt.to_string(),
                    reason,
                });
                resume(pid, None)?;
                Ok(EntryOutcome::AwaitingExit)
            }
            Decision::LogLeak => {
                warn!("Proxy leak detected, but allowed: {attempt}");
                self.audit.log(AuditEvent::LeakLogged {
                    dest: attempt.to_string(),
                });
                resume(pid, None)?;
                Ok(EntryOutcome::AwaitingExit)
            }
            Decision::KillChild => {
                warn!("Proxy leak detected: {attempt}. Killing the supervised program.");
                self.audit.log(AuditEvent::LeakKilled {
                    dest: attempt.to_string(),
                });
                // The group leader takes every thread and helper with it;
                // SIGKILL terminates the stopped tracee without a resume
                signal::killpg(root, Signal::SIGKILL).map_err(|source| {
                    TraceError::KillDelivery {
                        pgid: root,
                        signal: Signal::SIGKILL,
                        source,
                    }
                })?;
                Ok(EntryOutcome::AwaitingExit)
            }
            Decision::BlockSyscall => {
                nullify::nullify_connect(pid)?;
                warn!("Blocking -> {attempt}");
                self.audit.log(AuditEvent::LeakBlocked {
                    dest: attempt.to_string(),
                });
                Ok(EntryOutcome::SyscallComplete)
            }
        }
    }
}

/// Resume a stopped tracee toward its next syscall stop, optionally
/// delivering a signal.
///
/// A tracee that vanished between its stop and the resume (ESRCH) is not an
/// error; its exit notification is already on the way.
fn resume(pid: Pid, signal: Option<Signal>) -> Result<(), TraceError> {
    match ptrace::syscall(pid, signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(source) => Err(TraceError::Resume { pid, source }),
    }
}
