//! The database driver seam.
//!
//! The dispatcher talks to databases only through the [`Driver`] trait. A
//! driver hands back raw [`DriverValue`]s together with each column's
//! declared type; converting those into result cells is the dispatcher's
//! job.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::DriverError;
use crate::parameters::ParamValue;

/// Declared SQL type of a result column, as far as conversion cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Numeric,
    Decimal,
    Float,
    Double,
    Date,
    Timestamp,
    Other(String),
}

impl ColumnType {
    /// Maps a declared type name (`VARCHAR(20)`, `bigint`, `TIMESTAMP WITH
    /// TIME ZONE`, ...) onto a column type.
    pub fn from_declared(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("");
        match base {
            "int" | "integer" | "smallint" | "tinyint" | "mediumint" | "int2" | "int4" => {
                ColumnType::Integer
            }
            "bigint" | "int8" => ColumnType::BigInt,
            "numeric" | "number" => ColumnType::Numeric,
            "decimal" | "money" => ColumnType::Decimal,
            "float" | "real" | "float4" => ColumnType::Float,
            "double" | "float8" => ColumnType::Double,
            "date" => ColumnType::Date,
            "timestamp" | "datetime" | "timestamptz" => ColumnType::Timestamp,
            _ => ColumnType::Other(lower),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A raw value as produced by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    /// An instant with a known zone.
    Timestamp(DateTime<Utc>),
    /// Wall-clock time stored without a zone, already local.
    LocalTimestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl DriverValue {
    /// The driver's generic string rendering of a value.
    pub fn render(&self) -> Option<String> {
        match self {
            DriverValue::Null => None,
            DriverValue::Int(i) => Some(i.to_string()),
            DriverValue::Float(f) => Some(f.to_string()),
            DriverValue::Text(s) => Some(s.clone()),
            DriverValue::Bool(b) => Some(b.to_string()),
            DriverValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            DriverValue::Timestamp(t) => Some(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            DriverValue::LocalTimestamp(t) => Some(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            DriverValue::Blob(bytes) => Some(hex::encode(bytes)),
        }
    }
}

/// One result set from a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<DriverValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<DriverValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A dedicated, non-shared database connection.
///
/// Implementations are used by one action at a time and are closed before
/// the action returns.
pub trait Driver {
    /// Runs a query and returns every result set it produced.
    fn open_cursor(
        &mut self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Vec<ResultSet>, DriverError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute_update(&mut self, sql: &str, params: &[ParamValue]) -> Result<u64, DriverError>;

    /// Calls a stored procedure and returns its output parameters.
    fn execute_call(
        &mut self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Vec<DriverValue>, DriverError>;

    fn set_read_only(&mut self, read_only: bool) -> Result<(), DriverError>;

    /// Whether read-only mode may be switched on an open connection.
    fn supports_read_only(&self) -> bool {
        true
    }

    fn commit(&mut self) -> Result<(), DriverError>;

    fn close(&mut self) -> Result<(), DriverError>;
}

/// Scripted in-memory driver for testing.
///
/// Responses are registered per SQL text. Every call is recorded so tests
/// can assert on what the dispatcher sent.
#[derive(Debug, Default)]
pub struct InMemoryDriver {
    cursors: HashMap<String, Vec<ResultSet>>,
    updates: HashMap<String, u64>,
    calls: HashMap<String, Vec<DriverValue>>,
    failure: Option<String>,
    read_only_supported: bool,
    pub executed: Vec<(String, Vec<ParamValue>)>,
    pub read_only: bool,
    pub committed: bool,
    pub closed: bool,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self {
            read_only_supported: true,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, sql: &str, result_sets: Vec<ResultSet>) -> Self {
        self.cursors.insert(sql.to_string(), result_sets);
        self
    }

    pub fn with_update(mut self, sql: &str, affected: u64) -> Self {
        self.updates.insert(sql.to_string(), affected);
        self
    }

    pub fn with_call(mut self, sql: &str, outputs: Vec<DriverValue>) -> Self {
        self.calls.insert(sql.to_string(), outputs);
        self
    }

    /// Makes every statement fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn without_read_only(mut self) -> Self {
        self.read_only_supported = false;
        self
    }

    fn record(&mut self, sql: &str, params: &[ParamValue]) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.executed.push((sql.to_string(), params.to_vec()));
        match &self.failure {
            Some(message) => Err(DriverError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}

impl Driver for InMemoryDriver {
    fn open_cursor(
        &mut self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Vec<ResultSet>, DriverError> {
        self.record(sql, params)?;
        Ok(self.cursors.get(sql).cloned().unwrap_or_default())
    }

    fn execute_update(&mut self, sql: &str, params: &[ParamValue]) -> Result<u64, DriverError> {
        self.record(sql, params)?;
        Ok(self.updates.get(sql).copied().unwrap_or(0))
    }

    fn execute_call(
        &mut self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Vec<DriverValue>, DriverError> {
        self.record(sql, params)?;
        Ok(self.calls.get(sql).cloned().unwrap_or_default())
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), DriverError> {
        if !self.read_only_supported {
            return Err(DriverError::Unsupported("read-only mode".to_string()));
        }
        self.read_only = read_only;
        Ok(())
    }

    fn supports_read_only(&self) -> bool {
        self.read_only_supported
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.committed = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        Ok(())
    }
}
