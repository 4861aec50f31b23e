//! Loader configuration
//!
//! Controls the sandbox around the parser and how much shared memory it
//! gets. Every field has a default, so an empty TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::DocumentFormat;
use crate::error::{ConfigError, Result};
use crate::record::JailConfRecord;
use crate::sandbox::SandboxPolicy;

/// Loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Size of the shared arena in bytes
    #[serde(default = "default_arena_size")]
    pub arena_size: usize,

    /// Largest accepted config file in bytes
    #[serde(default = "default_read_ceiling")]
    pub read_ceiling: usize,

    /// Switch the parser to the real uid/gid before it opens the file
    #[serde(default = "default_true")]
    pub drop_privilege: bool,

    /// Parser CPU time ceiling in seconds (None = unlimited)
    #[serde(default = "default_cpu_limit_secs")]
    pub cpu_limit_secs: Option<u64>,

    /// Document syntax; None picks by file extension
    #[serde(default)]
    pub format: Option<DocumentFormat>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "sandblast_config=trace")
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_arena_size() -> usize {
    640 * 1024
}

fn default_read_ceiling() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

fn default_cpu_limit_secs() -> Option<u64> {
    Some(2)
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            arena_size: default_arena_size(),
            read_ceiling: default_read_ceiling(),
            drop_privilege: true,
            cpu_limit_secs: default_cpu_limit_secs(),
            format: None,
            log_filter: None,
        }
    }
}

impl LoaderConfig {
    /// Load loader settings from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate loader settings
    ///
    /// The arena must at least hold the record and `read_ceiling` bytes of
    /// text. That is a floor, not a guarantee: a document can still need more
    /// (every limit rule takes a 64-byte slot), and running out during a load
    /// fails with [`ConfigError::ArenaExhausted`] or [`ConfigError::TextTooLong`].
    pub fn validate(&self) -> Result<()> {
        if self.read_ceiling == 0 {
            return Err(ConfigError::InvalidLoaderConfig(
                "read_ceiling must be greater than 0".to_string(),
            ));
        }
        if self.cpu_limit_secs == Some(0) {
            return Err(ConfigError::InvalidLoaderConfig(
                "cpu_limit_secs must be greater than 0 (omit it for no limit)".to_string(),
            ));
        }
        let floor = std::mem::size_of::<JailConfRecord>().saturating_add(self.read_ceiling);
        if self.arena_size < floor {
            return Err(ConfigError::InvalidLoaderConfig(format!(
                "arena_size {} cannot hold the record plus read_ceiling {}",
                self.arena_size, self.read_ceiling
            )));
        }
        Ok(())
    }

    /// Format for `path`: the configured one, else by extension
    pub fn format_for(&self, path: &Path) -> DocumentFormat {
        self.format.unwrap_or_else(|| DocumentFormat::from_path(path))
    }

    /// Sandbox restrictions derived from these settings
    pub fn sandbox_policy(&self) -> SandboxPolicy {
        SandboxPolicy {
            drop_privilege: self.drop_privilege,
            cpu_limit_secs: self.cpu_limit_secs,
            read_ceiling: self.read_ceiling,
        }
    }
}
