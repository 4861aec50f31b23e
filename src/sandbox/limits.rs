//! Privilege and resource restrictions applied in the parser child

use nix::sys::resource::{setrlimit, Resource};
use nix::unistd::{getegid, geteuid, getgid, getuid, setegid, seteuid};

use crate::error::{ConfigError, Result};

/// Give up effective privileges: effective ids become the real ids.
///
/// A setuid/setgid invoker therefore opens the config file with the
/// caller's own rights.
pub fn drop_privilege() -> Result<()> {
    let (gid, uid) = (getgid(), getuid());
    if getegid() != gid {
        setegid(gid).map_err(ConfigError::DropPrivilege)?;
    }
    if geteuid() != uid {
        seteuid(uid).map_err(ConfigError::DropPrivilege)?;
    }
    Ok(())
}

/// Cap CPU time for the current process (soft and hard limit alike).
pub fn apply_cpu_limit(secs: u64) -> Result<()> {
    let limit = libc::rlim_t::try_from(secs)
        .map_err(|_| ConfigError::CpuLimit(nix::errno::Errno::EINVAL))?;
    setrlimit(Resource::RLIMIT_CPU, limit, limit).map_err(ConfigError::CpuLimit)?;
    Ok(())
}
