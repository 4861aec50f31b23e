//! Resource limit rules (`<resource>:deny=<value>`)

use crate::arena::{FixedSeq, SharedArena};
use crate::document::{DocumentNode, Iteration, NodeKind};
use crate::error::{ConfigError, Result};

/// Arena bytes reserved for each formatted rule
pub const LIMIT_RULE_CAPACITY: usize = 64;

/// Resource names are ASCII letters only.
pub fn check_resource_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::EmptyResourceName);
    }
    if let Some(character) = name.chars().find(|c| !c.is_ascii_alphabetic()) {
        return Err(ConfigError::ResourceName {
            character,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate one resource entry and format it as a deny rule.
pub fn limit_rule<N: DocumentNode>(name: &str, value: &N) -> Result<String> {
    check_resource_name(name)?;
    let amount = value
        .to_int_safe()
        .ok_or_else(|| ConfigError::ResourceNotNumber {
            name: name.to_string(),
        })?;
    if amount < 0 {
        return Err(ConfigError::ResourceNegative {
            name: name.to_string(),
        });
    }
    Ok(format!("{}:deny={}", name, amount))
}

/// Walk the `resources` table and append one rule per entry to `limits`.
pub fn stage_resources<N: DocumentNode, const L: usize>(
    arena: &mut SharedArena,
    limits: &mut FixedSeq<L>,
    node: &N,
) -> Result<()> {
    if node.kind() != NodeKind::Object {
        return Err(ConfigError::WrongType {
            key: "resources".to_string(),
            expected: "a table of resource limits",
        });
    }
    for child in node.children(Iteration::Expand) {
        let name = child.key.unwrap_or_default();
        if limits.is_full() {
            return Err(ConfigError::TooManyLimits { limit: L });
        }
        let rule = limit_rule(name, child.node)?;
        let slot = arena.reserve_text(LIMIT_RULE_CAPACITY)?;
        let text = arena.write_text(slot, &rule)?;
        limits
            .push(text)
            .map_err(|_| ConfigError::TooManyLimits { limit: L })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_letters_only() {
        assert!(check_resource_name("cputime").is_ok());
        assert!(check_resource_name("memoryUse").is_ok());

        let err = check_resource_name("cpu-time").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ResourceName { character: '-', ref name } if name == "cpu-time"
        ));
        assert!(matches!(
            check_resource_name("nproc2"),
            Err(ConfigError::ResourceName { character: '2', .. })
        ));
        assert!(matches!(
            check_resource_name("wällclock"),
            Err(ConfigError::ResourceName { character: 'ä', .. })
        ));
        assert!(matches!(
            check_resource_name(""),
            Err(ConfigError::EmptyResourceName)
        ));
    }

    #[test]
    fn test_rule_format() {
        assert_eq!(limit_rule("cputime", &json!(30)).unwrap(), "cputime:deny=30");
        assert_eq!(limit_rule("openfiles", &json!(0)).unwrap(), "openfiles:deny=0");
    }

    #[test]
    fn test_rule_value_must_be_non_negative_integer() {
        assert!(matches!(
            limit_rule("memoryuse", &json!(-1)),
            Err(ConfigError::ResourceNegative { .. })
        ));
        assert!(matches!(
            limit_rule("memoryuse", &json!("1g")),
            Err(ConfigError::ResourceNotNumber { .. })
        ));
        assert!(matches!(
            limit_rule("memoryuse", &json!(1.5)),
            Err(ConfigError::ResourceNotNumber { .. })
        ));
    }
}
