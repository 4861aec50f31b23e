//! Capability mode: no new access to the global namespace
//!
//! FreeBSD uses Capsicum (`cap_enter`). Linux approximates it with a
//! seccomp-BPF denylist: syscalls that look up or open paths, create
//! sockets, execute programs, create processes, submit io_uring work, mutate
//! the filesystem, signal other processes or change credentials fail with
//! `EPERM`. Already-open descriptors keep working. Other platforms refuse to
//! run the parser unconfined.
//!
//! No new processes may be created: a descendant could keep writing to the
//! shared arena after the parent has reaped the child and verified the
//! record. Threads (`clone` with `CLONE_THREAD`) stay allowed.

use std::io;

use crate::error::{ConfigError, Result};

#[cfg(target_os = "freebsd")]
pub fn enter_capability_mode() -> Result<()> {
    // SAFETY: cap_enter takes no arguments and only affects this process.
    if unsafe { libc::cap_enter() } != 0 {
        return Err(ConfigError::CapabilityMode(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
pub fn enter_capability_mode() -> Result<()> {
    use seccompiler::{apply_filter, BpfProgram, SeccompAction, SeccompFilter, TargetArch};

    let arch: TargetArch = std::env::consts::ARCH
        .try_into()
        .map_err(|e| capability_error(format!("unsupported architecture: {:?}", e)))?;

    let filter = SeccompFilter::new(
        filter_rules()?,
        SeccompAction::Allow,
        SeccompAction::Errno(libc::EPERM as u32),
        arch,
    )
    .map_err(|e| capability_error(format!("failed to create filter: {}", e)))?;
    let program: BpfProgram = filter
        .try_into()
        .map_err(|e| capability_error(format!("failed to compile filter: {}", e)))?;

    // Required for an unprivileged process to install a filter.
    // SAFETY: plain prctl with integer arguments.
    if unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) } != 0 {
        return Err(ConfigError::CapabilityMode(io::Error::last_os_error()));
    }
    apply_filter(&program)
        .map_err(|e| capability_error(format!("failed to apply filter: {}", e)))?;
    Ok(())
}

#[cfg(not(any(target_os = "freebsd", target_os = "linux")))]
pub fn enter_capability_mode() -> Result<()> {
    Err(ConfigError::CapabilityMode(io::Error::new(
        io::ErrorKind::Unsupported,
        "capability mode is not available on this platform",
    )))
}

#[cfg(target_os = "linux")]
fn capability_error(message: String) -> ConfigError {
    ConfigError::CapabilityMode(io::Error::other(message))
}

#[cfg(target_os = "linux")]
type SyscallRules = std::collections::BTreeMap<i64, Vec<seccompiler::SeccompRule>>;

/// Syscalls whose x32 variants carry this bit in the syscall number
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
const X32_SYSCALL_BIT: i64 = 0x4000_0000;

/// Seccomp rule map: a syscall with an empty rule list is refused outright;
/// `clone` is refused unless it creates a thread.
#[cfg(target_os = "linux")]
pub(crate) fn filter_rules() -> Result<SyscallRules> {
    use seccompiler::{SeccompCmpArgLen, SeccompCmpOp, SeccompCondition, SeccompRule};

    let mut rules: SyscallRules = denied_syscalls()
        .into_iter()
        .map(|nr| (nr, Vec::new()))
        .collect();

    let without_thread_flag = SeccompCondition::new(
        0,
        SeccompCmpArgLen::Qword,
        SeccompCmpOp::MaskedEq(libc::CLONE_THREAD as u64),
        0,
    )
    .map_err(|e| capability_error(format!("bad clone condition: {}", e)))?;
    let process_clone = SeccompRule::new(vec![without_thread_flag])
        .map_err(|e| capability_error(format!("bad clone rule: {}", e)))?;
    rules.insert(i64::from(libc::SYS_clone), vec![process_clone]);

    // x32 entry points are never used by a 64-bit process; refuse the
    // x32-only range and the x32 twin of everything refused above.
    #[cfg(target_arch = "x86_64")]
    {
        let twins: Vec<i64> = rules.keys().map(|nr| nr | X32_SYSCALL_BIT).collect();
        for nr in twins.into_iter().chain((512..=547).map(|nr| nr | X32_SYSCALL_BIT)) {
            rules.insert(nr, Vec::new());
        }
    }
    Ok(rules)
}

/// Syscall numbers refused unconditionally once capability mode is entered
#[cfg(target_os = "linux")]
pub(crate) fn denied_syscalls() -> Vec<i64> {
    let mut denied = vec![
        // open
        libc::SYS_openat,
        libc::SYS_openat2,
        libc::SYS_open_by_handle_at,
        libc::SYS_name_to_handle_at,
        // path lookup
        libc::SYS_newfstatat,
        libc::SYS_statx,
        libc::SYS_faccessat,
        libc::SYS_faccessat2,
        libc::SYS_readlinkat,
        libc::SYS_inotify_add_watch,
        // asynchronous submission bypasses the filter
        libc::SYS_io_uring_setup,
        libc::SYS_io_uring_enter,
        libc::SYS_io_uring_register,
        // network
        libc::SYS_socket,
        libc::SYS_socketpair,
        libc::SYS_connect,
        libc::SYS_bind,
        libc::SYS_listen,
        libc::SYS_accept,
        libc::SYS_accept4,
        // exec and process creation
        libc::SYS_execve,
        libc::SYS_execveat,
        libc::SYS_clone3,
        // filesystem mutation
        libc::SYS_unlinkat,
        libc::SYS_renameat,
        libc::SYS_renameat2,
        libc::SYS_mkdirat,
        libc::SYS_mknodat,
        libc::SYS_linkat,
        libc::SYS_symlinkat,
        libc::SYS_fchmodat,
        libc::SYS_fchownat,
        libc::SYS_truncate,
        libc::SYS_utimensat,
        // namespace
        libc::SYS_chdir,
        libc::SYS_fchdir,
        libc::SYS_chroot,
        libc::SYS_pivot_root,
        libc::SYS_mount,
        libc::SYS_umount2,
        libc::SYS_unshare,
        libc::SYS_setns,
        // other processes
        libc::SYS_ptrace,
        libc::SYS_process_vm_readv,
        libc::SYS_process_vm_writev,
        libc::SYS_kill,
        libc::SYS_tkill,
        libc::SYS_tgkill,
        // credentials
        libc::SYS_setuid,
        libc::SYS_setgid,
        libc::SYS_setreuid,
        libc::SYS_setregid,
        libc::SYS_setresuid,
        libc::SYS_setresgid,
        libc::SYS_setfsuid,
        libc::SYS_setfsgid,
        libc::SYS_setgroups,
    ];
    #[cfg(target_arch = "x86_64")]
    denied.extend([
        libc::SYS_open,
        libc::SYS_creat,
        libc::SYS_stat,
        libc::SYS_lstat,
        libc::SYS_access,
        libc::SYS_readlink,
        libc::SYS_fork,
        libc::SYS_vfork,
        libc::SYS_unlink,
        libc::SYS_rename,
        libc::SYS_mkdir,
        libc::SYS_rmdir,
        libc::SYS_link,
        libc::SYS_symlink,
        libc::SYS_chmod,
        libc::SYS_chown,
        libc::SYS_lchown,
        libc::SYS_mknod,
    ]);
    denied.into_iter().map(i64::from).collect()
}
