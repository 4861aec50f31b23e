//! Shared helpers for loader integration tests

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use sandblast_config::{ConfigLoader, LoaderConfig};
use tempfile::{Builder, NamedTempFile};

/// A config document on disk; removed on drop
pub struct JailFile {
    file: NamedTempFile,
}

impl JailFile {
    pub fn toml(contents: &str) -> Self {
        Self::with_suffix(".toml", contents.as_bytes())
    }

    pub fn json(contents: &str) -> Self {
        Self::with_suffix(".json", contents.as_bytes())
    }

    pub fn raw(suffix: &str, contents: &[u8]) -> Self {
        Self::with_suffix(suffix, contents)
    }

    fn with_suffix(suffix: &str, contents: &[u8]) -> Self {
        let mut file = Builder::new()
            .prefix("jail")
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Loader with default settings
pub fn loader() -> ConfigLoader {
    ConfigLoader::new(LoaderConfig::default())
}

/// TOML array literal of `n` distinct IPv4 addresses
pub fn ipv4_array(n: usize) -> String {
    let addrs: Vec<String> = (0..n)
        .map(|i| format!("\"10.0.{}.{}\"", i / 256, i % 256))
        .collect();
    format!("[{}]", addrs.join(", "))
}
