//! Query definitions as loaded from an application.
//!
//! A [`Query`] is immutable once loaded. The only state it owns beyond its
//! definition is the lazily built [`ParameterMap`], which depends solely on
//! the SQL text and the input bindings.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::SlotResolutionError;
use crate::names::ControlNamespace;
use crate::parameters::{build_parameter_map, ParameterMap};
use crate::scanner;

/// A control (or pseudo-id) plus an optional sub-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Binding {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            field: None,
        }
    }

    pub fn with_field(item_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            field: Some(field.into()),
        }
    }

    /// The sub-field, if present and non-empty.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref().filter(|f| !f.is_empty())
    }

    /// `item_id` followed by `.field` when a field is set.
    pub fn dotted_name(&self) -> String {
        match self.field() {
            Some(field) => format!("{}.{}", self.item_id, field),
            None => self.item_id.clone(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.item_id.starts_with("System.")
    }
}

fn default_merge() -> bool {
    true
}

/// A database action's query, possibly with child queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub inputs: Vec<Binding>,
    #[serde(default)]
    pub outputs: Vec<Binding>,
    /// Execute once per row of input data rather than once per request.
    #[serde(default)]
    pub multi_row: bool,
    #[serde(default)]
    pub connection_index: usize,
    /// Name of the parent column this query's results are merged into when
    /// it runs as a child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_field: Option<String>,
    /// Correlate rows with the parent when running as a child.
    #[serde(default = "default_merge")]
    pub merge: bool,
    #[serde(default)]
    pub children: Vec<Query>,
    #[serde(skip)]
    parameter_map: OnceLock<ParameterMap>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            merge: true,
            ..Default::default()
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Binding>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn multi_row(mut self, multi_row: bool) -> Self {
        self.multi_row = multi_row;
        self
    }

    /// The SQL sent to the driver, with slot suffixes stripped.
    pub fn driver_sql(&self) -> String {
        scanner::unspecify_slots(&self.sql)
    }

    /// Returns the slot-to-input mapping, building it on first use.
    ///
    /// Concurrent first calls may each build the map; the results are
    /// identical and the first one stored wins. Failures are not cached.
    pub fn parameter_map(
        &self,
        namespace: &dyn ControlNamespace,
    ) -> Result<&ParameterMap, SlotResolutionError> {
        if let Some(map) = self.parameter_map.get() {
            return Ok(map);
        }
        let map = build_parameter_map(&self.sql, &self.inputs, namespace)?;
        Ok(self.parameter_map.get_or_init(|| map))
    }

    /// Depth of the deepest child chain, 0 for a query without children.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}
