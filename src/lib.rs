//! Sandblast jail configuration loader
//!
//! Reads a jail's declarative configuration (TOML or JSON) without trusting
//! the parser: a forked child drops privileges, caps its CPU time, enters
//! capability mode, and only then reads and parses the file. Results come
//! back through a shared anonymous mapping created before the fork, as a
//! fixed-layout record that holds arena offsets instead of pointers.
//!
//! ## Layout
//!
//! - [`arena`]: shared bump allocator and offset-based text references
//! - [`record`]: the arena-resident record and its verified view [`JailConf`]
//! - [`document`]: parser adapters behind [`document::DocumentNode`]
//! - [`validation`]: document walk, normalization, record construction
//! - [`sandbox`]: fork/privilege drop/CPU ceiling/capability mode
//! - [`loader`]: ties it together ([`ConfigLoader::load`])
//!
//! ```rust,no_run
//! use sandblast_config::ConfigLoader;
//! use std::path::Path;
//!
//! let conf = ConfigLoader::default().load(Path::new("/usr/local/jails/web/jail.toml"))?;
//! println!("{} runs {}", conf.jailname().unwrap_or("?"), conf.script());
//! # Ok::<(), sandblast_config::ConfigError>(())
//! ```

pub mod arena;
pub mod config;
pub mod document;
pub mod error;
pub mod loader;
pub mod record;
pub mod sandbox;
pub mod utils;
pub mod validation;

pub use config::LoaderConfig;
pub use document::DocumentFormat;
pub use error::{ChildStatus, ConfigError, ErrorFamily, Result};
pub use loader::{load, ConfigLoader};
pub use record::{JailConf, JailConfRecord};
