//! Error types for configuration loading
//!
//! Every layer returns [`Result`]. Only the loader facade turns an error into
//! process termination (see [`crate::loader::load_or_exit`]).

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Broad classification of a [`ConfigError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    /// A system call failed (mapping, fork, open, rlimit, sandbox entry, read, wait)
    Environment,
    /// The configuration document is malformed or violates the schema
    MalformedInput,
    /// The arena or a reserved slot is too small
    Capacity,
    /// The sandboxed parser did not hand back a usable record
    ParserOutcome,
}

/// How the sandboxed parser process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStatus {
    /// Exited with a non-zero status code
    Exited(i32),
    /// Terminated by a signal (e.g. SIGXCPU after the CPU ceiling)
    Signaled(String),
    /// Anything else `waitpid` reported
    Other(String),
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited(code) => write!(f, "exit status {}", code),
            ChildStatus::Signaled(signal) => write!(f, "killed by {}", signal),
            ChildStatus::Other(status) => write!(f, "{}", status),
        }
    }
}

/// Errors that can occur while loading a jail configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not mmap the config arena: {0}")]
    ArenaMap(#[source] nix::Error),

    #[error("Config arena exhausted: requested {requested} bytes, {remaining} remaining")]
    ArenaExhausted { requested: usize, remaining: usize },

    #[error("Config string too long: {len} bytes for a {capacity}-byte slot")]
    TextTooLong { len: usize, capacity: usize },

    #[error("Config arena root is already reserved")]
    RootReserved,

    #[error("Config arena root is missing or has the wrong size")]
    RootMissing,

    #[error("Could not fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("Could not wait for the parser process: {0}")]
    Wait(#[source] nix::Error),

    #[error("Could not read the config file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not seteuid for the config parser: {0}")]
    DropPrivilege(#[source] nix::Error),

    #[error("Could not limit CPU for the config parser: {0}")]
    CpuLimit(#[source] nix::Error),

    #[error("Could not enter capability mode for the config parser: {0}")]
    CapabilityMode(#[source] io::Error),

    #[error("Could not read config input: {0}")]
    Read(#[source] io::Error),

    #[error("Config file too long (limit {limit} bytes)")]
    TooLong { limit: usize },

    #[error("Config: Could not parse: {0}")]
    Parse(String),

    #[error("Config: `{key}` must be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("Config: Too many {family} addresses (limit {limit})")]
    TooManyAddresses { family: &'static str, limit: usize },

    #[error("Config: Invalid {family} address {address:?}: {reason}")]
    InvalidAddress {
        family: &'static str,
        address: String,
        reason: &'static str,
    },

    #[error("Config: Too many limits (limit {limit})")]
    TooManyLimits { limit: usize },

    #[error("Config: Resource name must not be empty")]
    EmptyResourceName,

    #[error("Config: Character '{character}' in resource name '{name}' isn't allowed")]
    ResourceName { character: char, name: String },

    #[error("Config: Limit for resource '{name}' is not a number")]
    ResourceNotNumber { name: String },

    #[error("Config: Limit for resource '{name}' is less than zero")]
    ResourceNegative { name: String },

    #[error("Config: You forgot to specify the `script`")]
    MissingScript,

    #[error("The parser process exited unsuccessfully ({status}){}", reason_suffix(.reason))]
    ParserFailed {
        status: ChildStatus,
        reason: Option<String>,
    },

    #[error("The parser process produced a corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Invalid loader configuration: {0}")]
    InvalidLoaderConfig(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

impl ConfigError {
    /// Process exit status for this error
    ///
    /// System-call failures exit with the underlying errno, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        let errno = match self {
            ConfigError::ArenaMap(e)
            | ConfigError::Fork(e)
            | ConfigError::Wait(e)
            | ConfigError::DropPrivilege(e)
            | ConfigError::CpuLimit(e) => Some(*e as i32),
            ConfigError::Open { source, .. } => source.raw_os_error(),
            ConfigError::CapabilityMode(e) | ConfigError::Read(e) => e.raw_os_error(),
            _ => None,
        };
        match errno {
            Some(code) if code > 0 && code < 256 => code,
            _ => 1,
        }
    }

    /// Which failure family this error belongs to
    pub fn family(&self) -> ErrorFamily {
        match self {
            ConfigError::ArenaMap(_)
            | ConfigError::Fork(_)
            | ConfigError::Wait(_)
            | ConfigError::Open { .. }
            | ConfigError::DropPrivilege(_)
            | ConfigError::CpuLimit(_)
            | ConfigError::CapabilityMode(_)
            | ConfigError::Read(_) => ErrorFamily::Environment,
            ConfigError::ArenaExhausted { .. }
            | ConfigError::TextTooLong { .. }
            | ConfigError::RootReserved
            | ConfigError::RootMissing => ErrorFamily::Capacity,
            ConfigError::ParserFailed { .. } | ConfigError::CorruptRecord(_) => {
                ErrorFamily::ParserOutcome
            }
            _ => ErrorFamily::MalformedInput,
        }
    }
}
