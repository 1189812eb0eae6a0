//! Connection acquisition for query nodes.
//!
//! Every query node gets a dedicated driver from a [`ConnectionProvider`]
//! and releases it before the action returns.

pub mod sqlite;

pub use sqlite::{SqliteConnections, SqliteDriver};

use dbaction_core::Driver;

use crate::error::DbResult;

/// Hands out dedicated, non-shared connections by connection index.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self, index: usize) -> DbResult<Box<dyn Driver>>;
}

impl<F> ConnectionProvider for F
where
    F: Fn(usize) -> DbResult<Box<dyn Driver>> + Send + Sync,
{
    fn acquire(&self, index: usize) -> DbResult<Box<dyn Driver>> {
        self(index)
    }
}
