//! Running database actions end to end.
//!
//! The engine resolves an action's parameters, consults the result cache,
//! executes the query tree node by node on dedicated connections and merges
//! child results into their parents.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dbaction_core::{
    expand, fingerprint, materialise_row, merge_children, row_count, CellFormat, ChildResult,
    Dispatcher, InputTable, ParamValue, Parameters, Query, RequestContext, TypedTable,
};
use parking_lot::Mutex;
use serde::Serialize;

use crate::application::Application;
use crate::cache::{LruResultCache, ResultCache};
use crate::config::EngineConfig;
use crate::connection::{ConnectionProvider, SqliteConnections};
use crate::error::{DbError, DbResult};

/// Request context extended with the variables of the action's page.
struct PageContext<'a> {
    request: &'a dyn RequestContext,
    variables: HashSet<String>,
}

impl RequestContext for PageContext<'_> {
    fn user_name(&self) -> Option<&str> {
        self.request.user_name()
    }

    fn device(&self) -> Option<&str> {
        self.request.device()
    }

    fn session_attribute(&self, key: &str) -> Option<ParamValue> {
        self.request.session_attribute(key)
    }

    fn input_table(&self) -> Option<&InputTable> {
        self.request.input_table()
    }

    fn has_page_variable(&self, name: &str) -> bool {
        self.variables.contains(name) || self.request.has_page_variable(name)
    }
}

/// Parameters of one query node and its children. Its serialised form is
/// the result cache fingerprint.
#[derive(Debug, Serialize)]
struct NodePlan {
    parameters: Vec<Parameters>,
    children: Vec<NodePlan>,
}

pub struct ActionEngine {
    app: Arc<Application>,
    connections: Box<dyn ConnectionProvider>,
    cache: Option<Arc<dyn ResultCache>>,
    config: EngineConfig,
    format: CellFormat,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ActionEngine {
    pub fn new(
        app: Arc<Application>,
        connections: impl ConnectionProvider + 'static,
        config: EngineConfig,
    ) -> DbResult<Self> {
        let format = config.cell_format()?;
        Ok(Self {
            app,
            connections: Box::new(connections),
            cache: None,
            config,
            format,
            in_flight: DashMap::new(),
        })
    }

    /// Engine over the application's SQLite connections, with an LRU result
    /// cache when the configuration enables one.
    pub fn from_config(app: Arc<Application>, config: EngineConfig) -> DbResult<Self> {
        let connections = SqliteConnections::from_application(&app);
        let cache = if config.cache_enabled() {
            LruResultCache::with_capacity(
                config.cache.capacity,
                Duration::from_secs(config.cache.ttl_seconds),
            )
        } else {
            tracing::debug!("Result cache disabled");
            None
        };
        let engine = Self::new(app, connections, config)?;
        Ok(match cache {
            Some(cache) => engine.with_cache(Arc::new(cache)),
            None => engine,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs an action and returns its result table, children merged in.
    pub fn run_action(
        &self,
        action_id: &str,
        request: &dyn RequestContext,
    ) -> DbResult<TypedTable> {
        let action = self.app.action(action_id)?;
        let query = &action.query;

        let depth = query.depth();
        if depth > self.config.max_child_depth {
            return Err(DbError::ChildDepthExceeded {
                depth,
                limit: self.config.max_child_depth,
            });
        }

        let ctx = PageContext {
            request,
            variables: self.app.page_variables(action_id),
        };
        let plan = self.plan(query, &ctx)?;
        let started = Instant::now();

        let result = match &self.cache {
            Some(cache) => self.run_cached(cache.as_ref(), action_id, query, &plan),
            None => self.run_tree(query, &plan),
        };

        if let Ok(table) = &result {
            tracing::debug!(
                "Action '{}' returned {} rows in {:?}",
                action_id,
                table.rows.len(),
                started.elapsed()
            );
        }
        result
    }

    fn run_cached(
        &self,
        cache: &dyn ResultCache,
        action_id: &str,
        query: &Query,
        plan: &NodePlan,
    ) -> DbResult<TypedTable> {
        let fp = fingerprint(plan);
        if let Some(table) = cache.get(&self.app.id, action_id, &fp) {
            tracing::debug!("Cache hit for action '{}'", action_id);
            return Ok(table);
        }

        let key = format!("{}\u{0}{}\u{0}{}", self.app.id, action_id, fp);
        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock();
            match cache.get(&self.app.id, action_id, &fp) {
                Some(table) => Ok(table),
                None => match self.run_tree(query, plan) {
                    Ok(table) => {
                        cache.put(&self.app.id, action_id, &fp, table.clone());
                        Ok(table)
                    }
                    Err(e) if e.is_execution_failure() => {
                        tracing::error!(
                            "Action '{}' failed silently due to cache: {}",
                            action_id,
                            e
                        );
                        Ok(TypedTable::default())
                    }
                    Err(e) => Err(e),
                },
            }
        };
        drop(lock);
        self.in_flight.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    /// Expanded parameters for `query` and every descendant, in tree order.
    fn plan(&self, query: &Query, ctx: &dyn RequestContext) -> DbResult<NodePlan> {
        let map = query.parameter_map(self.app.as_ref())?;
        let parameters = (0..row_count(query, ctx))
            .map(|row| {
                let unmapped =
                    materialise_row(&query.inputs, row, ctx, &self.config.control_marker);
                expand(map, &unmapped)
            })
            .collect();
        let children = query
            .children
            .iter()
            .map(|child| self.plan(child, ctx))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(NodePlan {
            parameters,
            children,
        })
    }

    fn run_tree(&self, query: &Query, plan: &NodePlan) -> DbResult<TypedTable> {
        let table = self.execute_node(query, &plan.parameters)?;
        if query.children.is_empty() {
            return Ok(table);
        }

        let mut children = Vec::with_capacity(query.children.len());
        for (child, child_plan) in query.children.iter().zip(&plan.children) {
            let child_table = self.run_tree(child, child_plan)?;
            children.push(ChildResult::new(
                child_table,
                child.merge_field.clone(),
                child.merge,
            ));
        }
        Ok(merge_children(table, children))
    }

    /// Executes one query on its own connection, committed then closed.
    fn execute_node(&self, query: &Query, parameters: &[Parameters]) -> DbResult<TypedTable> {
        let mut driver = self.connections.acquire(query.connection_index)?;
        let table = Dispatcher::new(&self.format).execute(query, parameters, driver.as_mut())?;

        if let Err(e) = driver.commit() {
            if let Err(close) = driver.close() {
                tracing::warn!("Failed to close connection after commit error: {}", close);
            }
            return Err(e.into());
        }
        if let Err(e) = driver.close() {
            tracing::warn!("Failed to close connection: {}", e);
        }
        Ok(table)
    }
}
