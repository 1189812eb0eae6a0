//! SQLite driver over rusqlite.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dbaction_core::{
    ColumnMeta, ColumnType, Driver, DriverError, DriverValue, ParamValue, ResultSet,
};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use super::ConnectionProvider;
use crate::application::Application;
use crate::error::{DbError, DbResult};

const BUSY_TIMEOUT_MS: u64 = 500;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn failed(err: rusqlite::Error) -> DriverError {
    DriverError::Failed(err.to_string())
}

fn to_sql_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Null => Value::Null,
        ParamValue::Boolean(b) => Value::Integer(i64::from(*b)),
        ParamValue::Integer(i) => Value::Integer(*i),
        ParamValue::Float(f) => Value::Real(*f),
        ParamValue::String(s) => Value::Text(s.clone()),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| match parse_timestamp(text)? {
            DriverValue::Timestamp(ts) => Some(ts.date_naive()),
            DriverValue::LocalTimestamp(local) => Some(local.date()),
            _ => None,
        })
}

/// Text with an explicit offset is an instant. Anything else is wall-clock
/// time and stays zone-less.
fn parse_timestamp(text: &str) -> Option<DriverValue> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(DriverValue::Timestamp(ts.with_timezone(&Utc)));
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(DriverValue::LocalTimestamp)
}

/// Reads a cell, turning date text into date values for date columns.
fn read_value(value: ValueRef<'_>, column_type: &ColumnType) -> DriverValue {
    match value {
        ValueRef::Null => DriverValue::Null,
        ValueRef::Integer(i) => DriverValue::Int(i),
        ValueRef::Real(f) => DriverValue::Float(f),
        ValueRef::Blob(b) => DriverValue::Blob(b.to_vec()),
        ValueRef::Text(t) => {
            let text = String::from_utf8_lossy(t).into_owned();
            let parsed = match column_type {
                ColumnType::Date => parse_date(&text).map(DriverValue::Date),
                ColumnType::Timestamp => parse_timestamp(&text),
                _ => None,
            };
            parsed.unwrap_or(DriverValue::Text(text))
        }
    }
}

/// Columns without a declared type (expressions, aggregates) take the
/// storage class of their first non-null value.
fn infer_untyped(columns: &mut [ColumnMeta], declared: &[bool], rows: &[Vec<DriverValue>]) {
    for (i, column) in columns.iter_mut().enumerate() {
        if declared[i] {
            continue;
        }
        let first = rows
            .iter()
            .map(|r| &r[i])
            .find(|v| **v != DriverValue::Null);
        column.column_type = match first {
            Some(DriverValue::Int(_)) => ColumnType::BigInt,
            Some(DriverValue::Float(_)) => ColumnType::Double,
            _ => ColumnType::Other(String::new()),
        };
    }
}

/// A single SQLite connection with an explicit transaction.
///
/// A transaction is opened before the first statement. Closing without a
/// commit rolls it back.
pub struct SqliteDriver {
    conn: Option<Connection>,
}

impl SqliteDriver {
    pub fn open(path: &Path) -> Result<Self, DriverError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(failed)?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .map_err(failed)?;
        Ok(Self { conn: Some(conn) })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }

    fn connection(&self) -> Result<&Connection, DriverError> {
        self.conn.as_ref().ok_or(DriverError::Closed)
    }

    fn begin(&self) -> Result<&Connection, DriverError> {
        let conn = self.connection()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN").map_err(failed)?;
        }
        Ok(conn)
    }
}

/// Binds at most as many values as the statement has placeholders.
fn bound<'p>(sql: &str, expected: usize, params: &'p [ParamValue]) -> &'p [ParamValue] {
    if params.len() > expected {
        tracing::debug!(
            "Dropping {} extra parameters for statement '{}'",
            params.len() - expected,
            sql
        );
        &params[..expected]
    } else {
        params
    }
}

impl Driver for SqliteDriver {
    fn open_cursor(
        &mut self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<Vec<ResultSet>, DriverError> {
        let conn = self.begin()?;
        let mut stmt = conn.prepare(sql).map_err(failed)?;

        let declared: Vec<bool> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().is_some())
            .collect();
        let mut columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .map(|c| {
                ColumnMeta::new(
                    c.name(),
                    ColumnType::from_declared(c.decl_type().unwrap_or_default()),
                )
            })
            .collect();

        let params = bound(sql, stmt.parameter_count(), params);
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(failed)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(failed)? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(failed)?;
                values.push(read_value(value, &column.column_type));
            }
            out.push(values);
        }

        infer_untyped(&mut columns, &declared, &out);
        Ok(vec![ResultSet::new(columns, out)])
    }

    fn execute_update(&mut self, sql: &str, params: &[ParamValue]) -> Result<u64, DriverError> {
        let conn = self.begin()?;
        let mut stmt = conn.prepare(sql).map_err(failed)?;
        let params = bound(sql, stmt.parameter_count(), params);
        let affected = stmt
            .execute(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(failed)?;
        Ok(affected as u64)
    }

    fn execute_call(
        &mut self,
        _sql: &str,
        _params: &[ParamValue],
    ) -> Result<Vec<DriverValue>, DriverError> {
        self.connection()?;
        Err(DriverError::Unsupported(
            "SQLite has no stored procedures".to_string(),
        ))
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), DriverError> {
        self.connection()?
            .pragma_update(None, "query_only", read_only)
            .map_err(failed)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        let conn = self.connection()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT").map_err(failed)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback on close failed: {}", e);
            }
        }
        conn.close().map_err(|(_, e)| failed(e))
    }
}

/// Opens SQLite files by connection index.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnections {
    paths: HashMap<usize, PathBuf>,
}

impl SqliteConnections {
    pub fn new(paths: HashMap<usize, PathBuf>) -> Self {
        Self { paths }
    }

    pub fn from_application(app: &Application) -> Self {
        Self::new(app.connections().clone())
    }
}

impl ConnectionProvider for SqliteConnections {
    fn acquire(&self, index: usize) -> DbResult<Box<dyn Driver>> {
        let path = self
            .paths
            .get(&index)
            .ok_or(DbError::ConnectionNotFound(index))?;
        Ok(Box::new(SqliteDriver::open(path)?))
    }
}
