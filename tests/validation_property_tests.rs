//! Property tests for validation invariants
//!
//! Runs parse and validation in-process (no fork) against a fresh arena.

use proptest::prelude::*;
use sandblast_config::arena::SharedArena;
use sandblast_config::validation::{
    check_resource_name, jailname_from_hostname, parse_and_validate, AddressList, ADDRS_LEN,
};
use sandblast_config::{DocumentFormat, JailConf, JailConfRecord};

fn validate_toml(doc: &str) -> sandblast_config::Result<JailConf> {
    let mut arena = SharedArena::create(256 * 1024)?;
    arena.reserve_root::<JailConfRecord>()?;
    parse_and_validate(doc.as_bytes(), DocumentFormat::Toml, &mut arena)?;
    JailConf::from_arena(arena)
}

proptest! {
    #[test]
    fn test_address_join_has_no_duplicates(
        addrs in proptest::collection::vec("10\\.0\\.0\\.[0-9]{1,2}", 1..ADDRS_LEN)
    ) {
        let mut list = AddressList::ipv4();
        for a in &addrs {
            list.push(a).unwrap();
        }
        list.dedup();
        let joined = list.joined();
        let parts: Vec<&str> = joined.split(',').collect();
        let mut unique = parts.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(parts.len(), unique.len());
        prop_assert_eq!(parts[0], addrs[0].as_str());
    }

    #[test]
    fn test_non_letter_names_rejected(
        prefix in "[a-z]{0,8}",
        bad in "[0-9_\\-. ]",
        suffix in "[a-z]{0,8}",
    ) {
        let name = format!("{}{}{}", prefix, bad, suffix);
        prop_assert!(check_resource_name(&name).is_err());
    }

    #[test]
    fn test_valid_resources_roundtrip_in_order(
        values in proptest::collection::vec(0i64..i64::MAX, 1..8)
    ) {
        let mut doc = String::from("script = \"run\"\n[resources]\n");
        let mut expected = Vec::new();
        for (i, v) in values.iter().enumerate() {
            let name: String = std::iter::repeat('r').take(i + 1).collect();
            doc.push_str(&format!("{} = {}\n", name, v));
            expected.push(format!("{}:deny={}", name, v));
        }
        let conf = validate_toml(&doc).unwrap();
        prop_assert_eq!(conf.limits(), expected);
    }

    #[test]
    fn test_derived_jailname_matches_hostname(hostname in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}") {
        let doc = format!("hostname = \"{}\"\nscript = \"run\"\n", hostname);
        let conf = validate_toml(&doc).unwrap();
        let expected = jailname_from_hostname(&hostname);
        prop_assert_eq!(conf.jailname(), Some(expected.as_str()));
    }

    #[test]
    fn test_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut arena = SharedArena::create(64 * 1024).unwrap();
        arena.reserve_root::<JailConfRecord>().unwrap();
        let _ = parse_and_validate(&bytes, DocumentFormat::Toml, &mut arena);
        let _ = parse_and_validate(&bytes, DocumentFormat::Json, &mut arena);
    }
}
