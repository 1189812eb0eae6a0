//! Error types for dbaction-core.
//!
//! Minimal error types without host dependencies (no rusqlite, no toml).

use thiserror::Error;

/// Failures while resolving SQL slots against declared inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotResolutionError {
    /// A declared input is never referenced by a stored procedure call.
    /// `index` is 1-based.
    #[error(
        "Input {index} is not used in the SQL - \
         stored procedure calls must reference every input"
    )]
    UnusedInput { index: usize },
}

/// Errors reported by a database driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Driver error: {0}")]
    Failed(String),

    #[error("Operation not supported by driver: {0}")]
    Unsupported(String),

    #[error("Connection is closed")]
    Closed,
}

/// Action error type
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Slot resolution error: {0}")]
    SlotResolution(#[from] SlotResolutionError),

    #[error("Query execution error: {source}")]
    QueryExecution {
        #[source]
        source: DriverError,
    },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl ActionError {
    pub fn execution(source: DriverError) -> Self {
        ActionError::QueryExecution { source }
    }

    /// True for driver failures, the only errors a result cache may swallow.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, ActionError::QueryExecution { .. })
    }
}

/// Result type for action operations
pub type ActionResult<T> = Result<T, ActionError>;

impl serde::Serialize for ActionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
