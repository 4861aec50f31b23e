//! Declarative-object adapter
//!
//! Turns the raw config bytes into a generic key/scalar/array/object tree
//! using an off-the-shelf parser (`toml` or `serde_json`) and exposes the
//! few typed accessors the validator needs through [`DocumentNode`].
//!
//! The tree only lives for the duration of one validation pass; anything
//! needed afterwards is copied into the arena.

mod json_node;
mod toml_node;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Shape of a node in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Array,
    Object,
}

/// How [`DocumentNode::children`] treats nested containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Unroll array-valued object entries into one child per element (same
    /// key) and flatten nested arrays
    Expand,
    /// Yield nested containers as single leaves
    Opaque,
}

/// One child produced by [`DocumentNode::children`]
#[derive(Debug, Clone, Copy)]
pub struct Child<'a, N> {
    /// Object key, `None` for array elements and scalars
    pub key: Option<&'a str>,
    pub node: &'a N,
}

/// Typed access to a parsed document node
pub trait DocumentNode: Sized {
    /// Object entries in document order, `None` if not an object
    fn entries(&self) -> Option<Vec<(&str, &Self)>>;

    /// Array elements, `None` if not an array
    fn elements(&self) -> Option<&[Self]>;

    /// Text form of any node; never fails
    fn to_text_forced(&self) -> String;

    /// Integer value without truncation or wrap-around
    fn to_int_safe(&self) -> Option<i64>;

    fn kind(&self) -> NodeKind {
        if self.elements().is_some() {
            NodeKind::Array
        } else if self.entries().is_some() {
            NodeKind::Object
        } else {
            NodeKind::Scalar
        }
    }

    /// Direct children: object entries, array elements, or the scalar itself.
    fn children(&self, mode: Iteration) -> Vec<Child<'_, Self>> {
        let mut out = Vec::new();
        if let Some(entries) = self.entries() {
            for (key, node) in entries {
                push_child(&mut out, Some(key), node, mode);
            }
        } else if let Some(elements) = self.elements() {
            for node in elements {
                push_child(&mut out, None, node, mode);
            }
        } else {
            out.push(Child { key: None, node: self });
        }
        out
    }
}

fn push_child<'a, N: DocumentNode>(
    out: &mut Vec<Child<'a, N>>,
    key: Option<&'a str>,
    node: &'a N,
    mode: Iteration,
) {
    match (mode, node.elements()) {
        (Iteration::Expand, Some(items)) => {
            for item in items {
                push_child(out, key, item, mode);
            }
        }
        _ => out.push(Child { key, node }),
    }
}

/// Exact float-to-integer conversion: finite, integral, inside `i64`.
pub(crate) fn float_to_int(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Config document syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from the file extension (`.json`, anything else is TOML)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Toml,
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(DocumentFormat::Toml),
            "json" => Ok(DocumentFormat::Json),
            other => Err(format!("unknown config format '{}'", other)),
        }
    }
}

/// A fully parsed document
#[derive(Debug)]
pub enum Document {
    Toml(toml::Value),
    Json(serde_json::Value),
}

impl Document {
    /// Parse a complete buffer. A partially parsed tree is never returned.
    pub fn parse(buf: &[u8], format: DocumentFormat) -> Result<Self> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| ConfigError::Parse(format!("not UTF-8: {}", e)))?;
        let doc = match format {
            DocumentFormat::Toml => {
                let table: toml::Table = text
                    .parse()
                    .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
                Document::Toml(toml::Value::Table(table))
            }
            DocumentFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(text)
                    .map_err(|e| ConfigError::Parse(e.to_string()))?;
                if !value.is_object() {
                    return Err(ConfigError::Parse(
                        "top level must be an object".to_string(),
                    ));
                }
                Document::Json(value)
            }
        };
        debug!("Parsed {} byte {:?} document", buf.len(), format);
        Ok(doc)
    }
}
