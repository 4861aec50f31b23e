//! Validator / normalizer
//!
//! Walks a parsed document and writes a [`JailConfRecord`] into the arena.
//! Runs inside the sandboxed parser process; the first error aborts the
//! pass and the parent never sees a partially written record (the root is
//! only stored once every field has been accepted).
//!
//! Top-level keys:
//! - `hostname`, `jailname`, `script`: any scalar, stored as text
//! - `ipv4`, `ipv6`: array of addresses (or a single scalar), deduplicated
//!   and comma-joined
//! - `resources`: table of `name = non-negative integer`, stored as
//!   `"<name>:deny=<value>"` rules in document order
//!
//! Unknown keys are ignored.

pub mod addresses;
pub mod resources;

use tracing::{debug, warn};

use crate::arena::{SharedArena, TextRef};
use crate::document::{Document, DocumentFormat, DocumentNode, Iteration, NodeKind};
use crate::error::{ConfigError, Result};
use crate::record::JailConfRecord;

pub use addresses::{AddressList, ADDRS_LEN};
pub use resources::{check_resource_name, limit_rule, LIMIT_RULE_CAPACITY};

/// Jail name derived from a hostname: every `.` becomes `_`.
pub fn jailname_from_hostname(hostname: &str) -> String {
    hostname.replace('.', "_")
}

/// Validate a document tree and store the resulting record as the arena root.
///
/// The arena must already have a [`JailConfRecord`] root reserved.
pub fn validate<N: DocumentNode>(root: &N, arena: &mut SharedArena) -> Result<()> {
    if root.kind() != NodeKind::Object {
        return Err(ConfigError::WrongType {
            key: "<document>".to_string(),
            expected: "a table at the top level",
        });
    }
    // Fail early if the caller forgot the root, before anything is copied.
    arena.root::<JailConfRecord>()?;

    let mut record = JailConfRecord::default();
    let mut hostname: Option<String> = None;
    let mut ipv4 = AddressList::ipv4();
    let mut ipv6 = AddressList::ipv6();

    for child in root.children(Iteration::Opaque) {
        let Some(key) = child.key else {
            continue;
        };
        match key {
            "hostname" => {
                let text = scalar_text(key, child.node)?;
                record.hostname = arena.copy_text(&text)?;
                hostname = Some(text);
            }
            "jailname" => record.jailname = copy_scalar(arena, key, child.node)?,
            "script" => record.script = copy_scalar(arena, key, child.node)?,
            "ipv4" => ipv4.stage(child.node)?,
            "ipv6" => ipv6.stage(child.node)?,
            "resources" => resources::stage_resources(arena, &mut record.limits, child.node)?,
            other => debug!("Ignoring unknown config key '{}'", other),
        }
    }

    if !record.script.is_set() {
        return Err(ConfigError::MissingScript);
    }

    record.ipv4 = store_addresses(arena, &mut ipv4)?;
    record.ipv6 = store_addresses(arena, &mut ipv6)?;

    if !record.jailname.is_set() {
        match hostname {
            Some(ref h) => record.jailname = arena.copy_text(&jailname_from_hostname(h))?,
            None => warn!("Neither hostname nor jailname set; jail will be unnamed"),
        }
    }

    *arena.root_mut::<JailConfRecord>()? = record;
    debug!("Config record written ({} arena bytes used)", arena.used());
    Ok(())
}

/// Parse `buf` and validate it into `arena` in one step.
///
/// The document tree is dropped before returning.
pub fn parse_and_validate(
    buf: &[u8],
    format: DocumentFormat,
    arena: &mut SharedArena,
) -> Result<()> {
    Document::parse(buf, format)?.validate_into(arena)
}

impl Document {
    pub fn validate_into(&self, arena: &mut SharedArena) -> Result<()> {
        match self {
            Document::Toml(root) => validate(root, arena),
            Document::Json(root) => validate(root, arena),
        }
    }
}

fn scalar_text<N: DocumentNode>(key: &str, node: &N) -> Result<String> {
    if node.kind() != NodeKind::Scalar {
        return Err(ConfigError::WrongType {
            key: key.to_string(),
            expected: "a string",
        });
    }
    Ok(node.to_text_forced())
}

fn copy_scalar<N: DocumentNode>(arena: &mut SharedArena, key: &str, node: &N) -> Result<TextRef> {
    let text = scalar_text(key, node)?;
    arena.copy_text(&text)
}

// An empty list leaves the field unset.
fn store_addresses(arena: &mut SharedArena, list: &mut AddressList) -> Result<TextRef> {
    list.dedup();
    if list.is_empty() {
        return Ok(TextRef::UNSET);
    }
    arena.copy_text(&list.joined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LIMITS_LEN;
    use proptest::prelude::*;

    fn fresh_arena() -> SharedArena {
        let mut arena = SharedArena::create(64 * 1024).unwrap();
        arena.reserve_root::<JailConfRecord>().unwrap();
        arena
    }

    fn run(doc: &str) -> (SharedArena, Result<()>) {
        let mut arena = fresh_arena();
        let result = parse_and_validate(doc.as_bytes(), DocumentFormat::Toml, &mut arena);
        (arena, result)
    }

    fn text(arena: &SharedArena, r: TextRef) -> Option<String> {
        arena.text(r).unwrap().map(str::to_string)
    }

    #[test]
    fn test_minimal_document() {
        let (arena, result) = run("script = \"/usr/local/bin/run\"\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.script).as_deref(), Some("/usr/local/bin/run"));
        assert!(!record.hostname.is_set());
        assert!(!record.jailname.is_set());
        assert!(!record.ipv4.is_set());
        assert!(record.limits.is_empty());
    }

    #[test]
    fn test_missing_script() {
        let (arena, result) = run("hostname = \"a.b\"\n");
        assert!(matches!(result, Err(ConfigError::MissingScript)));
        // Nothing committed to the root
        let record = arena.root::<JailConfRecord>().unwrap();
        assert!(!record.hostname.is_set());
    }

    #[test]
    fn test_jailname_derived_from_hostname() {
        let (arena, result) = run("hostname = \"web.prod.example\"\nscript = \"run\"\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.jailname).as_deref(), Some("web_prod_example"));
    }

    #[test]
    fn test_explicit_jailname_wins() {
        let (arena, result) =
            run("hostname = \"web.prod\"\njailname = \"custom\"\nscript = \"run\"\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.jailname).as_deref(), Some("custom"));
    }

    #[test]
    fn test_scalars_are_forced_to_text() {
        let (arena, result) = run("hostname = 42\nscript = true\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.hostname).as_deref(), Some("42"));
        assert_eq!(text(&arena, record.script).as_deref(), Some("true"));
    }

    #[test]
    fn test_container_script_is_wrong_type() {
        let (_, result) = run("script = [\"a\", \"b\"]\n");
        assert!(matches!(result, Err(ConfigError::WrongType { ref key, .. }) if key == "script"));
    }

    #[test]
    fn test_addresses_deduplicated_and_joined() {
        let (arena, result) = run(
            "script = \"run\"\nipv4 = [\"10.0.0.1\", \"10.0.0.2\", \"10.0.0.1\"]\nipv6 = [\"::1\"]\n",
        );
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.ipv4).as_deref(), Some("10.0.0.1,10.0.0.2"));
        assert_eq!(text(&arena, record.ipv6).as_deref(), Some("::1"));
    }

    #[test]
    fn test_empty_address_list_leaves_field_unset() {
        let (arena, result) = run("script = \"run\"\nipv4 = []\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert!(!record.ipv4.is_set());
    }

    #[test]
    fn test_too_many_addresses() {
        let addrs: Vec<String> = (0..=ADDRS_LEN).map(|i| format!("\"10.0.0.{}\"", i)).collect();
        let doc = format!("script = \"run\"\nipv4 = [{}]\n", addrs.join(", "));
        let (_, result) = run(&doc);
        assert!(matches!(result, Err(ConfigError::TooManyAddresses { .. })));
    }

    #[test]
    fn test_resources_in_document_order() {
        let (arena, result) =
            run("script = \"run\"\n[resources]\nmemoryuse = 1073741824\ncputime = 30\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        let rules: Vec<String> = record.limits.iter().filter_map(|r| text(&arena, r)).collect();
        assert_eq!(rules, vec!["memoryuse:deny=1073741824", "cputime:deny=30"]);
    }

    #[test]
    fn test_resource_array_value_expands() {
        let (arena, result) = run("script = \"run\"\n[resources]\nnproc = [4, 8]\n");
        result.unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        let rules: Vec<String> = record.limits.iter().filter_map(|r| text(&arena, r)).collect();
        assert_eq!(rules, vec!["nproc:deny=4", "nproc:deny=8"]);
    }

    #[test]
    fn test_resource_errors() {
        let (_, result) = run("script = \"run\"\n[resources]\ncpu-time = 30\n");
        assert!(matches!(result, Err(ConfigError::ResourceName { character: '-', .. })));

        let (_, result) = run("script = \"run\"\n[resources]\nmemoryuse = -1\n");
        assert!(matches!(result, Err(ConfigError::ResourceNegative { .. })));

        let (_, result) = run("script = \"run\"\nresources = 5\n");
        assert!(matches!(result, Err(ConfigError::WrongType { .. })));
    }

    #[test]
    fn test_too_many_limits() {
        let mut doc = String::from("script = \"run\"\n[resources]\n");
        for i in 0..=LIMITS_LEN {
            let name: String = std::iter::repeat('a').take(i + 1).collect();
            doc.push_str(&format!("{} = 1\n", name));
        }
        let (_, result) = run(&doc);
        assert!(matches!(result, Err(ConfigError::TooManyLimits { limit: LIMITS_LEN })));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (_, result) = run("script = \"run\"\nmounts = [\"/a\"]\nfoo = { bar = 1 }\n");
        result.unwrap();
    }

    #[test]
    fn test_json_document() {
        let mut arena = fresh_arena();
        let doc = br#"{"script": "run", "hostname": "a.b", "ipv4": "10.0.0.9"}"#;
        parse_and_validate(doc, DocumentFormat::Json, &mut arena).unwrap();
        let record = arena.root::<JailConfRecord>().unwrap();
        assert_eq!(text(&arena, record.jailname).as_deref(), Some("a_b"));
        assert_eq!(text(&arena, record.ipv4).as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_requires_reserved_root() {
        let mut arena = SharedArena::create(4096).unwrap();
        let result = parse_and_validate(b"script = \"run\"\n", DocumentFormat::Toml, &mut arena);
        assert!(matches!(result, Err(ConfigError::RootMissing)));
    }

    proptest! {
        #[test]
        fn prop_dedup_preserves_first_occurrence(
            addrs in proptest::collection::vec("[0-9]{1,3}\\.[0-9]{1,3}", 0..ADDRS_LEN)
        ) {
            let mut list = AddressList::ipv4();
            for a in &addrs {
                list.push(a).unwrap();
            }
            list.dedup();
            let joined = list.joined();

            let mut expected: Vec<&str> = Vec::new();
            for a in &addrs {
                if !expected.contains(&a.as_str()) {
                    expected.push(a);
                }
            }
            prop_assert_eq!(joined, expected.join(","));
        }

        #[test]
        fn prop_jailname_has_no_dots(hostname in "[a-z.]{0,40}") {
            let name = jailname_from_hostname(&hostname);
            prop_assert!(!name.contains('.'));
            prop_assert_eq!(name.len(), hostname.len());
        }

        #[test]
        fn prop_letter_names_accepted(name in "[a-zA-Z]{1,24}") {
            prop_assert!(check_resource_name(&name).is_ok());
        }
    }
}
