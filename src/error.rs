use dbaction_core::{ActionError, DriverError, SlotResolutionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Action '{0}' not found")]
    ActionNotFound(String),

    #[error("Connection {0} is not configured")]
    ConnectionNotFound(usize),

    #[error("Child query depth {depth} exceeds the limit of {limit}")]
    ChildDepthExceeded { depth: usize, limit: usize },

    #[error("Invalid application: {0}")]
    InvalidApplication(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// True for driver failures, which a configured result cache swallows.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, DbError::Action(e) if e.is_execution_failure())
    }
}

impl From<SlotResolutionError> for DbError {
    fn from(err: SlotResolutionError) -> Self {
        DbError::Action(ActionError::from(err))
    }
}

impl From<DriverError> for DbError {
    fn from(err: DriverError) -> Self {
        DbError::Action(ActionError::execution(err))
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
