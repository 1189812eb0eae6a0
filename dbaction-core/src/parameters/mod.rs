//! Parameter values, slot maps, materialisation and expansion.

mod expand;
mod map;
mod materialise;

#[cfg(test)]
mod tests;

pub use expand::expand;
pub use map::{build_parameter_map, ParameterMap};
pub use materialise::{materialise_row, row_count, DEFAULT_CONTROL_MARKER};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scalar that can be printed or bound to a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<&Value> for ParamValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Integer(i),
                None => ParamValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ParamValue::String(s.clone()),
            other => ParamValue::String(other.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Boolean(b)
    }
}

/// One value per declared input (unmapped) or per slot (expanded).
pub type Parameters = Vec<ParamValue>;

/// Caller-supplied input data, `{"fields": [...], "rows": [[...]]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTable {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl InputTable {
    pub fn new(fields: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { fields, rows }
    }

    /// Value at `row` for the field matching `name` case-insensitively.
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self
            .fields
            .iter()
            .position(|f| f.eq_ignore_ascii_case(name))?;
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// Canonical string form of expanded parameters, used as the result cache
/// key. Accepts a single parameters list or any structure nesting them.
pub fn fingerprint<T: Serialize + ?Sized>(parameters: &T) -> String {
    serde_json::to_string(parameters).unwrap_or_default()
}
