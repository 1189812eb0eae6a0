pub mod application;
pub mod cache;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;

pub use application::{ActionDef, Application, ConnectionDef, Page};
pub use cache::{LruResultCache, ResultCache};
pub use config::{CacheConfig, EngineConfig};
pub use connection::{ConnectionProvider, SqliteConnections, SqliteDriver};
pub use engine::ActionEngine;
pub use error::{DbError, DbResult};

pub use dbaction_core::{ActionRequest, Cell, InputTable, ParamValue, RequestContext, TypedTable};
