//! The portable result shape returned by actions.
//!
//! A [`TypedTable`] serialises as `{"fields": [...], "rows": [[...]]}`, the
//! same shape callers send as input data, so a result can be fed straight
//! back in as the input of a further action.

use serde::Serialize;

/// A single typed value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Embedded child result, only produced by child merges.
    Table(TypedTable),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// String form used when correlating child rows with parent rows.
    /// Null and embedded tables never take part in a match.
    pub fn match_key(&self) -> Option<String> {
        match self {
            Cell::Str(s) => Some(s.clone()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Null | Cell::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TypedTable> {
        match self {
            Cell::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Str(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl From<TypedTable> for Cell {
    fn from(t: TypedTable) -> Self {
        Cell::Table(t)
    }
}

/// Column names plus ordered rows of ordered cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypedTable {
    #[serde(rename = "fields")]
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TypedTable {
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialises_as_fields_and_rows() {
        let table = TypedTable::with_rows(
            vec!["name".to_string(), "amount".to_string()],
            vec![vec![Cell::from("Bob"), Cell::Float(12.5)]],
        );
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value, json!({"fields": ["name", "amount"], "rows": [["Bob", 12.5]]}));
    }

    #[test]
    fn test_nested_table_and_null() {
        let child = TypedTable::with_rows(vec!["qty".to_string()], vec![vec![Cell::Int(5)]]);
        let parent = TypedTable::with_rows(
            vec!["id".to_string(), "items".to_string()],
            vec![
                vec![Cell::Int(1), Cell::Table(child)],
                vec![Cell::Int(2), Cell::Null],
            ],
        );
        let value = serde_json::to_value(&parent).unwrap();
        assert_eq!(
            value,
            json!({
                "fields": ["id", "items"],
                "rows": [[1, {"fields": ["qty"], "rows": [[5]]}], [2, null]]
            })
        );
    }

    #[test]
    fn test_match_keys() {
        assert_eq!(Cell::Int(1).match_key(), Some("1".to_string()));
        assert_eq!(Cell::Float(1.0).match_key(), Some("1".to_string()));
        assert_eq!(Cell::Bool(true).match_key(), Some("true".to_string()));
        assert_eq!(Cell::Null.match_key(), None);
        assert_eq!(Cell::Table(TypedTable::default()).match_key(), None);
    }
}
