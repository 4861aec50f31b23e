//! [`DocumentNode`] over `serde_json::Value`

use serde_json::Value;

use super::{float_to_int, DocumentNode};

impl DocumentNode for Value {
    fn entries(&self) -> Option<Vec<(&str, &Self)>> {
        self.as_object()
            .map(|map| map.iter().map(|(k, v)| (k.as_str(), v)).collect())
    }

    fn elements(&self) -> Option<&[Self]> {
        self.as_array().map(|a| a.as_slice())
    }

    fn to_text_forced(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn to_int_safe(&self) -> Option<i64> {
        let Value::Number(n) = self else {
            return None;
        };
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
        if n.is_u64() {
            // Above i64::MAX
            return None;
        }
        n.as_f64().and_then(float_to_int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Iteration, NodeKind};
    use serde_json::json;

    #[test]
    fn test_entries_keep_document_order() {
        let doc: Value =
            serde_json::from_str(r#"{"script": "run", "hostname": "h", "ipv4": []}"#).unwrap();
        let keys: Vec<_> = doc
            .children(Iteration::Opaque)
            .iter()
            .map(|c| c.key.unwrap())
            .collect();
        assert_eq!(keys, vec!["script", "hostname", "ipv4"]);
    }

    #[test]
    fn test_null_is_scalar() {
        assert_eq!(Value::Null.kind(), NodeKind::Scalar);
        assert_eq!(Value::Null.to_text_forced(), "null");
    }

    #[test]
    fn test_safe_int() {
        assert_eq!(json!(30).to_int_safe(), Some(30));
        assert_eq!(json!(-1).to_int_safe(), Some(-1));
        assert_eq!(json!(30.0).to_int_safe(), Some(30));
        assert_eq!(json!(0.5).to_int_safe(), None);
        assert_eq!(json!(u64::MAX).to_int_safe(), None);
        assert_eq!(json!("30").to_int_safe(), None);
    }

    #[test]
    fn test_forced_text() {
        assert_eq!(json!("10.0.0.1").to_text_forced(), "10.0.0.1");
        assert_eq!(json!(8).to_text_forced(), "8");
        assert_eq!(json!(false).to_text_forced(), "false");
        assert_eq!(json!(["a"]).to_text_forced(), "[\"a\"]");
    }
}
