//! [`DocumentNode`] over `toml::Value`

use toml::Value;

use super::{float_to_int, DocumentNode};

impl DocumentNode for Value {
    fn entries(&self) -> Option<Vec<(&str, &Self)>> {
        self.as_table()
            .map(|table| table.iter().map(|(k, v)| (k.as_str(), v)).collect())
    }

    fn elements(&self) -> Option<&[Self]> {
        self.as_array().map(|a| a.as_slice())
    }

    fn to_text_forced(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Datetime(d) => d.to_string(),
            Value::Array(_) | Value::Table(_) => self.to_string(),
        }
    }

    fn to_int_safe(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => float_to_int(*f),
            _ => None,
        }
    }
}
