//! Architecture capability for syscall register access.
//!
//! The dispatcher and nullifier never name machine registers directly; they
//! go through this module, which knows where each target architecture keeps
//! the syscall number, the argument words, and the return value. Only valid
//! while the tracee is stopped.

use nix::sys::ptrace;
use nix::unistd::Pid;

use super::error::TraceError;

/// Out-of-range syscall number written into the outcome register during
/// nullification. The kernel's syscall-return machinery reports it to the
/// child as a plain failure of the original call.
pub const INVALID_SYSCALL: u64 = u64::MAX;

/// A tracee's syscall-relevant register set.
#[derive(Debug, Clone, Copy)]
pub struct SyscallRegs {
    raw: libc::user_regs_struct,
}

#[cfg(target_arch = "x86_64")]
impl SyscallRegs {
    /// Syscall number dispatched at the current stop.
    pub fn syscall_number(&self) -> u64 {
        self.raw.orig_rax
    }

    /// The six raw argument words, in ABI order.
    pub fn args(&self) -> [u64; 6] {
        [
            self.raw.rdi,
            self.raw.rsi,
            self.raw.rdx,
            self.raw.r10,
            self.raw.r8,
            self.raw.r9,
        ]
    }

    /// Value of the return register (meaningful at a syscall-exit stop).
    pub fn return_value(&self) -> u64 {
        self.raw.rax
    }

    /// Overwrite the return register.
    pub fn set_return_value(&mut self, value: u64) {
        self.raw.rax = value;
    }
}

#[cfg(target_arch = "aarch64")]
impl SyscallRegs {
    /// Syscall number dispatched at the current stop.
    pub fn syscall_number(&self) -> u64 {
        self.raw.regs[8]
    }

    /// The six raw argument words, in ABI order.
    pub fn args(&self) -> [u64; 6] {
        [
            self.raw.regs[0],
            self.raw.regs[1],
            self.raw.regs[2],
            self.raw.regs[3],
            self.raw.regs[4],
            self.raw.regs[5],
        ]
    }

    /// Value of the return register (meaningful at a syscall-exit stop).
    pub fn return_value(&self) -> u64 {
        self.raw.regs[0]
    }

    /// Overwrite the return register.
    pub fn set_return_value(&mut self, value: u64) {
        self.raw.regs[0] = value;
    }
}

/// Read the register set of a stopped tracee.
#[cfg(target_arch = "x86_64")]
pub fn read(pid: Pid) -> Result<SyscallRegs, TraceError> {
    ptrace::getregs(pid)
        .map(|raw| SyscallRegs { raw })
        .map_err(|source| TraceError::RegisterRead { pid, source })
}

/// Write a register set back to a stopped tracee.
#[cfg(target_arch = "x86_64")]
pub fn write(pid: Pid, regs: &SyscallRegs) -> Result<(), TraceError> {
    ptrace::setregs(pid, regs.raw).map_err(|source| TraceError::RegisterWrite { pid, source })
}

/// Read the register set of a stopped tracee.
#[cfg(target_arch = "aarch64")]
pub fn read(pid: Pid) -> Result<SyscallRegs, TraceError> {
    ptrace::getregset::<ptrace::regset::NT_PRSTATUS>(pid)
        .map(|raw| SyscallRegs { raw })
        .map_err(|source| TraceError::RegisterRead { pid, source })
}

/// Write a register set back to a stopped tracee.
#[cfg(target_arch = "aarch64")]
pub fn write(pid: Pid, regs: &SyscallRegs) -> Result<(), TraceError> {
    ptrace::setregset::<ptrace::regset::NT_PRSTATUS>(pid, regs.raw)
        .map_err(|source| TraceError::RegisterWrite { pid, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> SyscallRegs {
        SyscallRegs {
            raw: unsafe { std::mem::zeroed() },
        }
    }

    #[test]
    fn test_invalid_syscall_is_out_of_range() {
        // No Linux architecture has a syscall table anywhere near this
        assert_eq!(INVALID_SYSCALL, u64::MAX);
    }

    #[test]
    fn test_return_value_round_trip() {
        let mut regs = zeroed();
        assert_eq!(regs.return_value(), 0);
        regs.set_return_value(INVALID_SYSCALL);
        assert_eq!(regs.return_value(), INVALID_SYSCALL);
    }

    #[test]
    fn test_zeroed_args_are_zero() {
        assert_eq!(zeroed().args(), [0u64; 6]);
        assert_eq!(zeroed().syscall_number(), 0);
    }
}
