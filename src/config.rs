//! Engine configuration
//!
//! Read from `dbaction.toml` in a configuration directory. A missing file
//! means defaults.
//!
//! ## Environment Variables
//!
//! The following environment variables override config file settings:
//!
//! - `DBACTION_DATE_FORMAT` - strftime format for dates
//! - `DBACTION_DATE_TIME_FORMAT` - strftime format for timestamps
//! - `DBACTION_UTC_OFFSET_MINUTES` - local offset used to render timestamps
//! - `DBACTION_CONTROL_MARKER` - substring identifying control ids
//! - `DBACTION_MAX_CHILD_DEPTH` - deepest allowed child query nesting
//! - `DBACTION_CACHE_CAPACITY` - result cache entries, 0 disables the cache
//!
//! These can be set in a `.env` file in the configuration directory.

use std::path::Path;

use chrono::FixedOffset;
use dbaction_core::{
    CellFormat, DEFAULT_CONTROL_MARKER, DEFAULT_DATE_FORMAT, DEFAULT_DATE_TIME_FORMAT,
};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "dbaction.toml";

/// Environment variable names
pub const ENV_DATE_FORMAT: &str = "DBACTION_DATE_FORMAT";
pub const ENV_DATE_TIME_FORMAT: &str = "DBACTION_DATE_TIME_FORMAT";
pub const ENV_UTC_OFFSET_MINUTES: &str = "DBACTION_UTC_OFFSET_MINUTES";
pub const ENV_CONTROL_MARKER: &str = "DBACTION_CONTROL_MARKER";
pub const ENV_MAX_CHILD_DEPTH: &str = "DBACTION_MAX_CHILD_DEPTH";
pub const ENV_CACHE_CAPACITY: &str = "DBACTION_CACHE_CAPACITY";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Date rendering for date columns and midnight timestamps
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Date-time rendering for timestamp columns
    #[serde(default = "default_date_time_format")]
    pub date_time_format: String,
    /// Local offset from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Substring that marks an item id as a control id
    #[serde(default = "default_control_marker")]
    pub control_marker: String,
    /// Deepest allowed chain of child queries
    #[serde(default = "default_max_child_depth")]
    pub max_child_depth: usize,
    /// Result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_date_time_format() -> String {
    DEFAULT_DATE_TIME_FORMAT.to_string()
}

fn default_control_marker() -> String {
    DEFAULT_CONTROL_MARKER.to_string()
}

fn default_max_child_depth() -> usize {
    16
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached results, 0 disables caching
    #[serde(default)]
    pub capacity: usize,
    /// Seconds a cached result stays valid
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            date_time_format: default_date_time_format(),
            utc_offset_minutes: 0,
            control_marker: default_control_marker(),
            max_child_depth: default_max_child_depth(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a directory
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides.
    pub fn load(dir: &Path) -> DbResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!(
                "No {} in {}, using defaults",
                CONFIG_FILE_NAME,
                dir.display()
            );
            EngineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml(content: &str) -> DbResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(format) = std::env::var(ENV_DATE_FORMAT) {
            if !format.is_empty() {
                self.date_format = format;
            }
        }

        if let Ok(format) = std::env::var(ENV_DATE_TIME_FORMAT) {
            if !format.is_empty() {
                self.date_time_format = format;
            }
        }

        if let Ok(offset) = std::env::var(ENV_UTC_OFFSET_MINUTES) {
            if let Ok(offset) = offset.parse::<i32>() {
                self.utc_offset_minutes = offset;
            }
        }

        if let Ok(marker) = std::env::var(ENV_CONTROL_MARKER) {
            if !marker.is_empty() {
                self.control_marker = marker;
            }
        }

        if let Ok(depth) = std::env::var(ENV_MAX_CHILD_DEPTH) {
            if let Ok(depth) = depth.parse::<usize>() {
                self.max_child_depth = depth;
            }
        }

        if let Ok(capacity) = std::env::var(ENV_CACHE_CAPACITY) {
            if let Ok(capacity) = capacity.parse::<usize>() {
                self.cache.capacity = capacity;
            }
        }
    }

    fn validate(&self) -> DbResult<()> {
        if self.control_marker.is_empty() {
            return Err(DbError::ConfigError(
                "control_marker must not be empty".to_string(),
            ));
        }
        self.cell_format().map(|_| ())
    }

    pub fn utc_offset(&self) -> DbResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
            DbError::ConfigError(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Cell rendering settings for the dispatcher
    pub fn cell_format(&self) -> DbResult<CellFormat> {
        Ok(CellFormat::new(
            &self.date_format,
            &self.date_time_format,
            self.utc_offset()?,
        )?)
    }

    /// Whether a result cache should be created
    pub fn cache_enabled(&self) -> bool {
        self.cache.capacity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.date_format, "%d/%m/%Y");
        assert_eq!(config.control_marker, "_C");
        assert_eq!(config.max_child_depth, 16);
        assert!(!config.cache_enabled());
        assert!(config.cell_format().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = EngineConfig::from_toml(
            r#"
            date_format = "%Y-%m-%d"
            utc_offset_minutes = 120

            [cache]
            capacity = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.date_format, "%Y-%m-%d");
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 7200);
        assert_eq!(config.cache.capacity, 50);
        assert_eq!(config.cache.ttl_seconds, 300);
        assert!(config.cache_enabled());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineConfig::from_toml("utc_offset_minutes = 100000").is_err());
        assert!(EngineConfig::from_toml("control_marker = \"\"").is_err());
        assert!(EngineConfig::from_toml("date_format = \"%Q\"").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_child_depth, 16);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "max_child_depth = 4\n[cache]\nttl_seconds = 10\n",
        )
        .unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_child_depth, 4);
        assert_eq!(config.cache.ttl_seconds, 10);
    }
}
