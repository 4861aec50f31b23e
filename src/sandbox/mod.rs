//! Sandbox runner
//!
//! Runs untrusted work in a forked child that gives up privileges and
//! enters capability mode before touching the input. The only channel back
//! to the parent is the exit status and whatever the task wrote into
//! shared memory created before the fork.
//!
//! Child sequence, in order:
//! 1. drop effective privileges (optional)
//! 2. open the input file
//! 3. cap CPU time (optional)
//! 4. enter capability mode
//! 5. read the input, bounded by the read ceiling
//! 6. run the task
//! 7. exit: 0 on success, the error's exit code otherwise

pub mod capability;
pub mod limits;

use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::debug;

use crate::error::{ChildStatus, ConfigError, Result};

pub use capability::enter_capability_mode;
pub use limits::{apply_cpu_limit, drop_privilege};

/// Restrictions applied to the sandboxed child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// Switch effective uid/gid back to the real ones before opening the input
    pub drop_privilege: bool,
    /// CPU time ceiling in seconds, `None` for no ceiling
    pub cpu_limit_secs: Option<u64>,
    /// Largest accepted input in bytes
    pub read_ceiling: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            drop_privilege: true,
            cpu_limit_secs: Some(2),
            read_ceiling: 64 * 1024,
        }
    }
}

/// Work performed inside the sandbox on the input bytes
pub trait ChildTask {
    fn run(&mut self, input: &[u8]) -> Result<()>;

    /// Called in the child before it exits with a failure.
    fn report_failure(&mut self, _err: &ConfigError) {}
}

/// Fork, run `task` on the contents of `path` under `policy`, and wait.
///
/// Returns `Ok(())` only if the child exited with status 0. Any other
/// outcome becomes [`ConfigError::ParserFailed`] without a reason; callers
/// with a shared diagnostic channel fill it in.
///
/// The calling process must be single-threaded. After `fork` only the
/// calling thread exists in the child, and the child allocates while it
/// parses; a lock held by another thread at fork time (allocator, stderr)
/// would never be released and the child would block without using CPU,
/// out of reach of the CPU ceiling.
pub fn run_sandboxed<T: ChildTask>(policy: &SandboxPolicy, path: &Path, task: &mut T) -> Result<()> {
    // SAFETY: the caller is single-threaded (see above) and the child leaves
    // through `exit_child`, never returning into the caller's stack.
    match unsafe { fork() }.map_err(ConfigError::Fork)? {
        ForkResult::Child => exit_child(child_main(policy, path, task)),
        ForkResult::Parent { child } => {
            debug!("Spawned parser process {}", child);
            match wait_for(child)? {
                WaitStatus::Exited(_, 0) => Ok(()),
                status => Err(ConfigError::ParserFailed {
                    status: child_status(status),
                    reason: None,
                }),
            }
        }
    }
}

/// Terminate the child without running destructors or atexit handlers.
fn exit_child(code: i32) -> ! {
    // SAFETY: _exit never returns and touches no Rust state; the parent's
    // copy of every resource (arena included) stays owned by the parent.
    unsafe { libc::_exit(code) }
}

fn child_main<T: ChildTask>(policy: &SandboxPolicy, path: &Path, task: &mut T) -> i32 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let result = child_sequence(policy, path, task);
        if let Err(ref e) = result {
            task.report_failure(e);
        }
        result
    }));
    match outcome {
        Ok(Ok(())) => 0,
        // The message travels through `report_failure`; nothing is logged here.
        Ok(Err(e)) => e.exit_code(),
        Err(_) => 1,
    }
}

fn child_sequence<T: ChildTask>(policy: &SandboxPolicy, path: &Path, task: &mut T) -> Result<()> {
    if policy.drop_privilege {
        drop_privilege()?;
    }
    let mut file = File::open(path).map_err(|source| ConfigError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(secs) = policy.cpu_limit_secs {
        apply_cpu_limit(secs)?;
    }
    enter_capability_mode()?;

    let input = read_bounded(&mut file, policy.read_ceiling)?;
    drop(file);
    task.run(&input)
}

fn wait_for(child: Pid) -> Result<WaitStatus> {
    loop {
        match waitpid(child, None) {
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ConfigError::Wait(e)),
            Ok(WaitStatus::StillAlive) => continue,
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => return Ok(status),
            Ok(other) => {
                debug!("Ignoring wait status {:?}", other);
                continue;
            }
        }
    }
}

fn child_status(status: WaitStatus) -> ChildStatus {
    match status {
        WaitStatus::Exited(_, code) => ChildStatus::Exited(code),
        WaitStatus::Signaled(_, signal, _) => ChildStatus::Signaled(signal.as_str().to_string()),
        other => ChildStatus::Other(format!("{:?}", other)),
    }
}

/// Read everything from `reader`, failing if it holds more than `ceiling` bytes.
///
/// Reads at most one byte past the ceiling to tell "exactly full" from "too long".
pub fn read_bounded<R: Read>(reader: &mut R, ceiling: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(ceiling.min(64 * 1024) + 1);
    let probe = u64::try_from(ceiling).unwrap_or(u64::MAX).saturating_add(1);
    reader
        .take(probe)
        .read_to_end(&mut buf)
        .map_err(ConfigError::Read)?;
    if buf.len() > ceiling {
        return Err(ConfigError::TooLong { limit: ceiling });
    }
    Ok(buf)
}
