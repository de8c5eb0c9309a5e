//! L4 kernel syscall filter (spec §4.E table). Grounded in the
//! determinism cage's own `SyscallFilter`: probe whether the running
//! kernel/libc combination can express the filter at all, without ever
//! installing it — actually applying a seccomp-bpf program to a running
//! process is OS-kernel reinforcement work, explicitly out of scope here.

use crate::config::SyscallFilterProfile;

#[cfg(target_os = "linux")]
use seccompiler::{SeccompAction, SeccompFilter, TargetArch};

/// Address families and syscalls the filter's contract blocks (spec §4.E
/// L4 row): socket creation outside AF_UNIX/AF_INET/AF_INET6, and a set of
/// syscalls dangerous to sandbox integrity.
const BLOCKED_SYSCALLS: &[&str] = &[
    "ptrace",
    "process_vm_readv",
    "process_vm_writev",
    "init_module",
    "finit_module",
    "delete_module",
    "unshare",
    "setns",
    "setuid",
    "setgid",
    "setreuid",
    "setregid",
];

#[cfg(target_os = "linux")]
fn syscall_name_to_number(name: &str) -> Option<i64> {
    let number = match name {
        "ptrace" => libc::SYS_ptrace,
        "process_vm_readv" => libc::SYS_process_vm_readv,
        "process_vm_writev" => libc::SYS_process_vm_writev,
        "init_module" => libc::SYS_init_module,
        "finit_module" => libc::SYS_finit_module,
        "delete_module" => libc::SYS_delete_module,
        "unshare" => libc::SYS_unshare,
        "setns" => libc::SYS_setns,
        "setuid" => libc::SYS_setuid,
        "setgid" => libc::SYS_setgid,
        "setreuid" => libc::SYS_setreuid,
        "setregid" => libc::SYS_setregid,
        _ => return None,
    };
    Some(number)
}

/// Whether this host can express the L4 filter at all. Never installs
/// anything; a successful probe only means the kernel/libc combination
/// supports seccomp-bpf filter construction for the profiles this crate
/// defines.
pub fn probe_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        build_filter(SyscallFilterProfile::Strict).is_ok()
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(target_os = "linux")]
fn action_for(profile: SyscallFilterProfile) -> SeccompAction {
    match profile {
        SyscallFilterProfile::Strict => SeccompAction::Errno(libc::EPERM as u32),
        SyscallFilterProfile::Logging => SeccompAction::Log,
        SyscallFilterProfile::Paranoid => SeccompAction::KillProcess,
    }
}

#[cfg(target_os = "linux")]
pub fn build_filter(
    profile: SyscallFilterProfile,
) -> Result<SeccompFilter, seccompiler::Error> {
    let action = action_for(profile);
    let mut rules = std::collections::BTreeMap::new();
    for name in BLOCKED_SYSCALLS {
        if let Some(number) = syscall_name_to_number(name) {
            rules.insert(number, Vec::new());
        }
    }
    SeccompFilter::new(rules, SeccompAction::Allow, action, target_arch())
}

#[cfg(target_os = "linux")]
fn target_arch() -> TargetArch {
    #[cfg(target_arch = "aarch64")]
    {
        TargetArch::aarch64
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        TargetArch::x86_64
    }
}
