//! Statement classification, execution and cell conversion.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc};

use crate::driver::{ColumnType, Driver, DriverValue, ResultSet};
use crate::error::{ActionError, ActionResult, DriverError};
use crate::parameters::Parameters;
use crate::query::Query;
use crate::scanner::statement_prefix;
use crate::table::{Cell, TypedTable};

pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// How a statement is executed, decided by its leading verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `select`, `with`, `exec`: rows come back through a cursor.
    Read,
    /// `call`, `{call`: output parameters come back.
    Call,
    /// Anything else: affected-row counts come back.
    Write,
    /// Nothing to run.
    Empty,
}

pub fn classify(sql: &str) -> StatementKind {
    let prefix = statement_prefix(sql, 7);
    if prefix.is_empty() {
        StatementKind::Empty
    } else if ["select", "with", "exec"].iter().any(|v| prefix.starts_with(v)) {
        StatementKind::Read
    } else if prefix.starts_with("call") || prefix.starts_with("{call") {
        StatementKind::Call
    } else {
        StatementKind::Write
    }
}

/// Local date and date-time rendering for date columns.
#[derive(Debug, Clone)]
pub struct CellFormat {
    date_format: String,
    date_time_format: String,
    utc_offset: FixedOffset,
}

impl Default for CellFormat {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            date_time_format: DEFAULT_DATE_TIME_FORMAT.to_string(),
            utc_offset: Utc.fix(),
        }
    }
}

fn validate_format(format: &str) -> ActionResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ActionError::InvalidFormat(format.to_string()));
    }
    Ok(())
}

impl CellFormat {
    /// Creates a format, rejecting strftime strings chrono cannot render.
    pub fn new(
        date_format: &str,
        date_time_format: &str,
        utc_offset: FixedOffset,
    ) -> ActionResult<Self> {
        validate_format(date_format)?;
        validate_format(date_time_format)?;
        Ok(Self {
            date_format: date_format.to_string(),
            date_time_format: date_time_format.to_string(),
            utc_offset,
        })
    }

    fn date(&self, date: NaiveDate) -> Cell {
        Cell::Str(date.format(&self.date_format).to_string())
    }

    fn timestamp(&self, ts: DateTime<Utc>) -> Cell {
        self.local_timestamp(ts.with_timezone(&self.utc_offset).naive_local())
    }

    /// Timestamps at exactly local midnight render as dates.
    fn local_timestamp(&self, local: NaiveDateTime) -> Cell {
        let format = if local.num_seconds_from_midnight() == 0 && local.nanosecond() == 0 {
            &self.date_format
        } else {
            &self.date_time_format
        };
        Cell::Str(local.format(format).to_string())
    }

    /// Converts a value according to its column's declared type.
    pub fn convert(&self, column_type: &ColumnType, value: DriverValue) -> Cell {
        if value == DriverValue::Null {
            return Cell::Null;
        }
        match column_type {
            ColumnType::Integer | ColumnType::BigInt => match value {
                DriverValue::Int(i) => Cell::Int(i),
                DriverValue::Float(f) => integral_or_float(f),
                DriverValue::Text(s) => match s.trim().parse::<f64>() {
                    Ok(f) => integral_or_float(f),
                    Err(_) => Cell::Str(s),
                },
                other => generic(other),
            },
            ColumnType::Numeric | ColumnType::Decimal => match value {
                DriverValue::Int(i) => Cell::Int(i),
                DriverValue::Float(f) => Cell::Float(f),
                DriverValue::Text(s) => match s.trim().parse::<f64>() {
                    Ok(f) => Cell::Float(f),
                    Err(_) => Cell::Str(s),
                },
                other => generic(other),
            },
            ColumnType::Float | ColumnType::Double => match value {
                DriverValue::Int(i) => Cell::Float(i as f64),
                DriverValue::Float(f) => Cell::Float(f),
                DriverValue::Text(s) => match s.trim().parse::<f64>() {
                    Ok(f) => Cell::Float(f),
                    Err(_) => Cell::Str(s),
                },
                other => generic(other),
            },
            ColumnType::Date => match value {
                DriverValue::Date(d) => self.date(d),
                DriverValue::Timestamp(ts) => {
                    self.date(ts.with_timezone(&self.utc_offset).date_naive())
                }
                DriverValue::LocalTimestamp(local) => self.date(local.date()),
                other => generic(other),
            },
            ColumnType::Timestamp => match value {
                DriverValue::Timestamp(ts) => self.timestamp(ts),
                DriverValue::LocalTimestamp(local) => self.local_timestamp(local),
                DriverValue::Date(d) => self.date(d),
                other => generic(other),
            },
            ColumnType::Other(_) => generic(value),
        }
    }

    /// Converts a value that has no declared column type, such as a stored
    /// procedure output parameter.
    pub fn convert_untyped(&self, value: DriverValue) -> Cell {
        match value {
            DriverValue::Null => Cell::Null,
            DriverValue::Int(i) => Cell::Int(i),
            DriverValue::Float(f) => Cell::Float(f),
            DriverValue::Text(s) => Cell::Str(s),
            DriverValue::Bool(b) => Cell::Bool(b),
            DriverValue::Date(d) => self.date(d),
            DriverValue::Timestamp(ts) => self.timestamp(ts),
            DriverValue::LocalTimestamp(local) => self.local_timestamp(local),
            blob @ DriverValue::Blob(_) => generic(blob),
        }
    }
}

fn integral_or_float(f: f64) -> Cell {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Cell::Int(f as i64)
    } else {
        Cell::Float(f)
    }
}

fn generic(value: DriverValue) -> Cell {
    value.render().map(Cell::Str).unwrap_or(Cell::Null)
}

/// Runs queries against a driver and converts what comes back.
pub struct Dispatcher<'a> {
    format: &'a CellFormat,
}

impl<'a> Dispatcher<'a> {
    pub fn new(format: &'a CellFormat) -> Self {
        Self { format }
    }

    /// Executes `query` once per entry of `parameters_list`.
    ///
    /// On a driver failure the driver is closed before the error returns.
    pub fn execute(
        &self,
        query: &Query,
        parameters_list: &[Parameters],
        driver: &mut dyn Driver,
    ) -> ActionResult<TypedTable> {
        self.execute_sql(&query.driver_sql(), parameters_list, driver)
    }

    /// Executes already-unspecified SQL.
    pub fn execute_sql(
        &self,
        sql: &str,
        parameters_list: &[Parameters],
        driver: &mut dyn Driver,
    ) -> ActionResult<TypedTable> {
        let result = match classify(sql) {
            StatementKind::Empty => return Ok(TypedTable::default()),
            StatementKind::Read => self.read(sql, parameters_list, driver),
            StatementKind::Call => self.call(sql, parameters_list, driver),
            StatementKind::Write => self.write(sql, parameters_list, driver),
        };

        match result {
            Ok(table) => Ok(table),
            Err(source) => {
                if let Err(e) = driver.close() {
                    tracing::warn!("Failed to close connection after query error: {}", e);
                }
                Err(ActionError::execution(source))
            }
        }
    }

    fn read(
        &self,
        sql: &str,
        parameters_list: &[Parameters],
        driver: &mut dyn Driver,
    ) -> Result<TypedTable, DriverError> {
        if statement_prefix(sql, 6) == "select" && driver.supports_read_only() {
            if let Err(e) = driver.set_read_only(true) {
                tracing::debug!("Connection refused read-only mode: {}", e);
            }
        }

        let mut table = TypedTable::default();
        let mut captured = false;

        for params in parameters_list {
            for ResultSet { columns, rows } in driver.open_cursor(sql, params)? {
                if rows.is_empty() {
                    continue;
                }

                let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                if !captured {
                    table.columns = names;
                    captured = true;
                } else if table.columns != names {
                    tracing::warn!(
                        "Skipping {} rows from a result set with columns {:?}, expected {:?}",
                        rows.len(),
                        names,
                        table.columns
                    );
                    continue;
                }

                for row in rows {
                    let cells = row
                        .into_iter()
                        .enumerate()
                        .map(|(i, value)| match columns.get(i) {
                            Some(column) => self.format.convert(&column.column_type, value),
                            None => self.format.convert_untyped(value),
                        })
                        .collect();
                    table.push_row(cells);
                }
            }
        }

        Ok(table)
    }

    fn call(
        &self,
        sql: &str,
        parameters_list: &[Parameters],
        driver: &mut dyn Driver,
    ) -> Result<TypedTable, DriverError> {
        let mut table = TypedTable::default();
        for params in parameters_list {
            let outputs = driver.execute_call(sql, params)?;
            if table.columns.is_empty() {
                table.columns = (1..=outputs.len()).map(|i| format!("out{}", i)).collect();
            }
            table.push_row(
                outputs
                    .into_iter()
                    .map(|value| self.format.convert_untyped(value))
                    .collect(),
            );
        }
        Ok(table)
    }

    fn write(
        &self,
        sql: &str,
        parameters_list: &[Parameters],
        driver: &mut dyn Driver,
    ) -> Result<TypedTable, DriverError> {
        let mut total: u64 = 0;
        for params in parameters_list {
            total += driver.execute_update(sql, params)?;
        }
        Ok(TypedTable::with_rows(
            vec!["rows".to_string()],
            vec![vec![Cell::Int(i64::try_from(total).unwrap_or(i64::MAX))]],
        ))
    }
}
