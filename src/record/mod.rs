//! Jail configuration record
//!
//! [`JailConfRecord`] is the arena layout written by the sandboxed parser;
//! it is the arena root, so it sits at offset 0 of the shared mapping in
//! both processes. [`JailConf`] is what the parent hands out once the child
//! has exited cleanly and the record has been verified.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

use crate::arena::{FixedSeq, SharedArena, TextRef, ZeroSafe};
use crate::error::{ConfigError, Result};

/// Maximum number of resource limit rules
pub const LIMITS_LEN: usize = 32;
/// Mount descriptor slots reserved for the jail lifecycle manager
pub const MOUNTS_LEN: usize = 32;
/// Bytes reserved for the child's failure message
pub const DIAGNOSTIC_LEN: usize = 256;

/// Arena-resident configuration written once by the parser process
#[repr(C)]
#[derive(Clone, Copy)]
pub struct JailConfRecord {
    pub hostname: TextRef,
    pub jailname: TextRef,
    pub script: TextRef,
    pub ipv4: TextRef,
    pub ipv6: TextRef,
    /// `"<resource>:deny=<value>"` rules, in document order
    pub limits: FixedSeq<LIMITS_LEN>,
    /// Reserved; filled in by the mount setup outside the loader
    pub mounts: FixedSeq<MOUNTS_LEN>,
    diagnostic_len: u32,
    diagnostic: [u8; DIAGNOSTIC_LEN],
}

// SAFETY: TextRefs, FixedSeqs, a u32 and a byte array; all-zero is the empty record.
unsafe impl ZeroSafe for JailConfRecord {}

impl Default for JailConfRecord {
    fn default() -> Self {
        Self {
            hostname: TextRef::UNSET,
            jailname: TextRef::UNSET,
            script: TextRef::UNSET,
            ipv4: TextRef::UNSET,
            ipv6: TextRef::UNSET,
            limits: FixedSeq::default(),
            mounts: FixedSeq::default(),
            diagnostic_len: 0,
            diagnostic: [0; DIAGNOSTIC_LEN],
        }
    }
}

impl JailConfRecord {
    /// Store a failure message for the parent, cut at a char boundary if needed.
    pub fn set_diagnostic(&mut self, message: &str) {
        let mut end = message.len().min(DIAGNOSTIC_LEN);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.diagnostic[..end].copy_from_slice(&message.as_bytes()[..end]);
        self.diagnostic_len = end as u32;
    }

    /// The child's failure message, if it left one
    pub fn diagnostic(&self) -> Option<String> {
        let len = (self.diagnostic_len as usize).min(DIAGNOSTIC_LEN);
        if len == 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&self.diagnostic[..len]).into_owned())
    }
}

/// Verified, read-only jail configuration
///
/// Owns the shared mapping; dropping it unmaps the arena.
pub struct JailConf {
    arena: SharedArena,
}

impl JailConf {
    /// Check every reference in the record before trusting it.
    ///
    /// The record was written by a sandboxed, untrusted process.
    pub fn from_arena(arena: SharedArena) -> Result<Self> {
        let record = arena
            .root::<JailConfRecord>()
            .map_err(|_| ConfigError::CorruptRecord("record missing from arena".to_string()))?;

        for (name, field) in [
            ("hostname", record.hostname),
            ("jailname", record.jailname),
            ("script", record.script),
            ("ipv4", record.ipv4),
            ("ipv6", record.ipv6),
        ] {
            arena
                .text(field)
                .map_err(|e| ConfigError::CorruptRecord(format!("{}: {}", name, e)))?;
        }
        if !record.script.is_set() {
            return Err(ConfigError::CorruptRecord("script is unset".to_string()));
        }

        verify_seq(&arena, "limits", &record.limits)?;
        verify_seq(&arena, "mounts", &record.mounts)?;

        Ok(Self { arena })
    }

    fn record(&self) -> Option<&JailConfRecord> {
        self.arena.root::<JailConfRecord>().ok()
    }

    fn field(&self, pick: impl Fn(&JailConfRecord) -> TextRef) -> Option<&str> {
        let record = self.record()?;
        self.arena.text(pick(record)).ok().flatten()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.field(|r| r.hostname)
    }

    pub fn jailname(&self) -> Option<&str> {
        self.field(|r| r.jailname)
    }

    /// Entry-point command; always present in a verified record
    pub fn script(&self) -> &str {
        self.field(|r| r.script).unwrap_or_default()
    }

    /// Comma-joined, deduplicated IPv4 addresses
    pub fn ipv4(&self) -> Option<&str> {
        self.field(|r| r.ipv4)
    }

    /// Comma-joined, deduplicated IPv6 addresses
    pub fn ipv6(&self) -> Option<&str> {
        self.field(|r| r.ipv6)
    }

    /// Resource limit rules in document order
    pub fn limits(&self) -> Vec<&str> {
        self.seq(|r| &r.limits)
    }

    /// Mount descriptors (empty unless filled in after loading)
    pub fn mounts(&self) -> Vec<&str> {
        self.seq(|r| &r.mounts)
    }

    fn seq<const N: usize>(&self, pick: impl Fn(&JailConfRecord) -> &FixedSeq<N>) -> Vec<&str> {
        let Some(record) = self.record() else {
            return Vec::new();
        };
        pick(record)
            .iter()
            .filter_map(|r| self.arena.text(r).ok().flatten())
            .collect()
    }

    /// End of the highest text the parser stored in the arena.
    ///
    /// The parser's own allocation cursor lives in the child; this is the
    /// parent's view of the same high-water mark.
    pub fn arena_used(&self) -> usize {
        let Some(record) = self.record() else {
            return self.arena.used();
        };
        [record.hostname, record.jailname, record.script, record.ipv4, record.ipv6]
            .into_iter()
            .chain(record.limits.iter())
            .chain(record.mounts.iter())
            .map(|r| r.end())
            .fold(self.arena.used(), usize::max)
    }
}

fn verify_seq<const N: usize>(arena: &SharedArena, name: &str, seq: &FixedSeq<N>) -> Result<()> {
    if seq.raw_len() as usize > N {
        return Err(ConfigError::CorruptRecord(format!(
            "{} length {} exceeds capacity {}",
            name,
            seq.raw_len(),
            N
        )));
    }
    for (i, item) in seq.iter().enumerate() {
        match arena.text(item) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(ConfigError::CorruptRecord(format!("{}[{}] is unset", name, i)))
            }
            Err(e) => return Err(ConfigError::CorruptRecord(format!("{}[{}]: {}", name, i, e))),
        }
    }
    Ok(())
}

impl PartialEq for JailConf {
    fn eq(&self, other: &Self) -> bool {
        self.hostname() == other.hostname()
            && self.jailname() == other.jailname()
            && self.script() == other.script()
            && self.ipv4() == other.ipv4()
            && self.ipv6() == other.ipv6()
            && self.limits() == other.limits()
            && self.mounts() == other.mounts()
    }
}

impl fmt::Debug for JailConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JailConf")
            .field("hostname", &self.hostname())
            .field("jailname", &self.jailname())
            .field("script", &self.script())
            .field("ipv4", &self.ipv4())
            .field("ipv6", &self.ipv6())
            .field("limits", &self.limits())
            .field("mounts", &self.mounts())
            .finish()
    }
}

impl Serialize for JailConf {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("JailConf", 7)?;
        state.serialize_field("hostname", &self.hostname())?;
        state.serialize_field("jailname", &self.jailname())?;
        state.serialize_field("script", self.script())?;
        state.serialize_field("ipv4", &self.ipv4())?;
        state.serialize_field("ipv6", &self.ipv6())?;
        state.serialize_field("limits", &self.limits())?;
        state.serialize_field("mounts", &self.mounts())?;
        state.end()
    }
}
