//! Staging list for jail IP addresses

use std::collections::HashSet;

use crate::document::{DocumentNode, Iteration, NodeKind};
use crate::error::{ConfigError, Result};

/// Maximum number of addresses per family
pub const ADDRS_LEN: usize = 32;

/// Bounded accumulator for one address family during a single validation pass
#[derive(Debug)]
pub struct AddressList {
    family: &'static str,
    key: &'static str,
    seen: usize,
    addrs: Vec<String>,
}

impl AddressList {
    pub fn ipv4() -> Self {
        Self::new("IPv4", "ipv4")
    }

    pub fn ipv6() -> Self {
        Self::new("IPv6", "ipv6")
    }

    fn new(family: &'static str, key: &'static str) -> Self {
        Self {
            family,
            key,
            seen: 0,
            addrs: Vec::with_capacity(ADDRS_LEN),
        }
    }

    /// Stage every entry of an address array (a bare scalar counts as one entry).
    pub fn stage<N: DocumentNode>(&mut self, node: &N) -> Result<()> {
        if node.kind() == NodeKind::Object {
            return Err(self.wrong_type());
        }
        for child in node.children(Iteration::Opaque) {
            if child.node.kind() != NodeKind::Scalar {
                return Err(self.wrong_type());
            }
            self.push(&child.node.to_text_forced())?;
        }
        Ok(())
    }

    /// Stage one address. Blank entries are skipped but still count toward the limit.
    pub fn push(&mut self, addr: &str) -> Result<()> {
        if self.seen >= ADDRS_LEN {
            return Err(ConfigError::TooManyAddresses {
                family: self.family,
                limit: ADDRS_LEN,
            });
        }
        self.seen += 1;

        let addr = addr.trim();
        if addr.is_empty() {
            return Ok(());
        }
        if addr.contains(',') {
            return Err(ConfigError::InvalidAddress {
                family: self.family,
                address: addr.to_string(),
                reason: "commas are not allowed inside an address",
            });
        }
        self.addrs.push(addr.to_string());
        Ok(())
    }

    /// Drop repeated addresses, keeping the first occurrence of each.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::with_capacity(self.addrs.len());
        self.addrs.retain(|a| seen.insert(a.clone()));
    }

    /// Comma-joined addresses; empty when nothing was staged
    pub fn joined(&self) -> String {
        self.addrs.join(",")
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    fn wrong_type(&self) -> ConfigError {
        ConfigError::WrongType {
            key: self.key.to_string(),
            expected: "an array of address strings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut list = AddressList::ipv4();
        for a in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
            list.push(a).unwrap();
        }
        list.dedup();
        assert_eq!(list.joined(), "10.0.0.1,10.0.0.2");
    }

    #[test]
    fn test_empty_list_joins_to_empty() {
        let mut list = AddressList::ipv6();
        list.dedup();
        assert!(list.is_empty());
        assert_eq!(list.joined(), "");
    }

    #[test]
    fn test_capacity_is_exact() {
        let mut list = AddressList::ipv4();
        for i in 0..ADDRS_LEN {
            list.push(&format!("10.0.0.{}", i)).unwrap();
        }
        let err = list.push("10.0.1.1").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooManyAddresses {
                family: "IPv4",
                limit: ADDRS_LEN
            }
        ));
    }

    #[test]
    fn test_blank_entries_skipped_and_trimmed() {
        let mut list = AddressList::ipv4();
        list.push("  ").unwrap();
        list.push(" 10.0.0.1 ").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.joined(), "10.0.0.1");
    }

    #[test]
    fn test_comma_inside_address_rejected() {
        let mut list = AddressList::ipv6();
        let err = list.push("::1,::2").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { family: "IPv6", .. }));
    }

    #[test]
    fn test_stage_rejects_objects_and_nested_arrays() {
        let mut list = AddressList::ipv4();
        let obj = serde_json::json!({"a": "10.0.0.1"});
        assert!(matches!(list.stage(&obj), Err(ConfigError::WrongType { .. })));

        let nested = serde_json::json!([["10.0.0.1"]]);
        assert!(matches!(list.stage(&nested), Err(ConfigError::WrongType { .. })));
    }

    #[test]
    fn test_stage_scalar_is_single_entry() {
        let mut list = AddressList::ipv4();
        list.stage(&serde_json::json!("192.0.2.7")).unwrap();
        assert_eq!(list.joined(), "192.0.2.7");
    }
}
