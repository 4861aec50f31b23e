//! Privilege-separated config loader
//!
//! The parent maps a shared arena, forks a sandboxed parser that fills it,
//! and only trusts the result after the child exited cleanly and the
//! record passed verification.

use std::path::Path;

use tracing::{debug, info};

use crate::arena::SharedArena;
use crate::config::LoaderConfig;
use crate::document::DocumentFormat;
use crate::error::{ConfigError, Result};
use crate::record::{JailConf, JailConfRecord};
use crate::sandbox::{self, ChildTask};
use crate::utils::report_fatal;
use crate::validation::parse_and_validate;

/// Loads jail configurations through the sandboxed parser
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config: LoaderConfig,
}

impl ConfigLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load and validate the configuration at `path`.
    ///
    /// Blocks until the parser process has exited. Call it before spawning
    /// threads: the parser is forked and must not inherit locks held by
    /// other threads (see [`sandbox::run_sandboxed`]).
    pub fn load(&self, path: &Path) -> Result<JailConf> {
        self.config.validate()?;
        let format = self.config.format_for(path);

        let mut arena = SharedArena::create(self.config.arena_size)?;
        arena.reserve_root::<JailConfRecord>()?;
        debug!(
            "Loading {} as {:?} (arena {} bytes)",
            path.display(),
            format,
            arena.capacity()
        );

        let outcome = {
            let mut task = ParseIntoArena {
                arena: &mut arena,
                format,
            };
            sandbox::run_sandboxed(&self.config.sandbox_policy(), path, &mut task)
        };

        if let Err(err) = outcome {
            return Err(match err {
                ConfigError::ParserFailed { status, .. } => ConfigError::ParserFailed {
                    status,
                    reason: arena.root::<JailConfRecord>()?.diagnostic(),
                },
                other => other,
            });
        }

        let conf = JailConf::from_arena(arena)?;
        info!(
            "Loaded jail config {} (script {}, {} limits)",
            conf.jailname().unwrap_or("<unnamed>"),
            conf.script(),
            conf.limits().len()
        );
        Ok(conf)
    }

    /// Load the configuration or terminate the process.
    ///
    /// On failure the error is reported to the log and syslog and the
    /// process exits with [`ConfigError::exit_code`].
    pub fn load_or_exit(&self, path: &Path) -> JailConf {
        match self.load(path) {
            Ok(conf) => conf,
            Err(err) => {
                report_fatal(&err);
                std::process::exit(err.exit_code())
            }
        }
    }
}

/// Load `path` with default loader settings.
pub fn load(path: &Path) -> Result<JailConf> {
    ConfigLoader::default().load(path)
}

/// Child-side work: parse, validate, write the record
struct ParseIntoArena<'a> {
    arena: &'a mut SharedArena,
    format: DocumentFormat,
}

impl ChildTask for ParseIntoArena<'_> {
    fn run(&mut self, input: &[u8]) -> Result<()> {
        parse_and_validate(input, self.format, self.arena)
    }

    fn report_failure(&mut self, err: &ConfigError) {
        if let Ok(record) = self.arena.root_mut::<JailConfRecord>() {
            record.set_diagnostic(&err.to_string());
        }
    }
}
