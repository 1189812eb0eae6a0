//! Application definitions: controls, pages, connections and actions.
//!
//! An application is loaded from a TOML document. Connection paths are
//! resolved relative to the document's directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use dbaction_core::{Control, ControlNamespace, Query};
use serde::Deserialize;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDef {
    pub index: usize,
    pub path: PathBuf,
}

/// A top-level database action, owned by a page.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionDef {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(flatten)]
    pub query: Query,
}

#[derive(Debug, Deserialize)]
struct ApplicationFile {
    id: String,
    #[serde(default)]
    controls: Vec<Control>,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    connections: Vec<ConnectionDef>,
    #[serde(default)]
    actions: Vec<ActionDef>,
}

/// A loaded and validated application.
#[derive(Debug)]
pub struct Application {
    pub id: String,
    controls: HashMap<String, Control>,
    pages: HashMap<String, Page>,
    connections: HashMap<usize, PathBuf>,
    actions: HashMap<String, ActionDef>,
}

impl Application {
    /// Load an application from a TOML file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&content, base)
    }

    /// Parse an application, resolving relative connection paths against `base`.
    pub fn from_toml(content: &str, base: &Path) -> DbResult<Self> {
        let file: ApplicationFile = toml::from_str(content)?;
        Self::build(file, base)
    }

    fn build(file: ApplicationFile, base: &Path) -> DbResult<Self> {
        let mut controls = HashMap::new();
        for control in file.controls {
            if controls.contains_key(&control.id) {
                return Err(DbError::InvalidApplication(format!(
                    "duplicate control '{}'",
                    control.id
                )));
            }
            controls.insert(control.id.clone(), control);
        }

        let mut connections = HashMap::new();
        for conn in file.connections {
            let path = if conn.path.is_absolute() {
                conn.path
            } else {
                base.join(conn.path)
            };
            if connections.insert(conn.index, path).is_some() {
                return Err(DbError::InvalidApplication(format!(
                    "duplicate connection index {}",
                    conn.index
                )));
            }
        }

        let pages: HashMap<String, Page> =
            file.pages.into_iter().map(|p| (p.id.clone(), p)).collect();

        let mut actions = HashMap::new();
        for action in file.actions {
            let id = action.query.id.clone();
            if id.is_empty() {
                return Err(DbError::InvalidApplication(
                    "action without an id".to_string(),
                ));
            }
            if let Some(page) = &action.page {
                if !pages.contains_key(page) {
                    return Err(DbError::InvalidApplication(format!(
                        "action '{}' refers to unknown page '{}'",
                        id, page
                    )));
                }
            }
            check_connections(&action.query, &connections, &id)?;
            if actions.contains_key(&id) {
                return Err(DbError::InvalidApplication(format!(
                    "duplicate action '{}'",
                    id
                )));
            }
            actions.insert(id, action);
        }

        tracing::debug!(
            "Loaded application '{}': {} actions, {} controls, {} connections",
            file.id,
            actions.len(),
            controls.len(),
            connections.len()
        );

        Ok(Self {
            id: file.id,
            controls,
            pages,
            connections,
            actions,
        })
    }

    pub fn action(&self, id: &str) -> DbResult<&ActionDef> {
        self.actions
            .get(id)
            .ok_or_else(|| DbError::ActionNotFound(id.to_string()))
    }

    /// Variables declared by the page owning `action_id`.
    pub fn page_variables(&self, action_id: &str) -> HashSet<String> {
        self.actions
            .get(action_id)
            .and_then(|a| a.page.as_ref())
            .and_then(|page| self.pages.get(page))
            .map(|page| page.variables.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_path(&self, index: usize) -> Option<&Path> {
        self.connections.get(&index).map(PathBuf::as_path)
    }

    pub fn connections(&self) -> &HashMap<usize, PathBuf> {
        &self.connections
    }
}

fn check_connections(
    query: &Query,
    connections: &HashMap<usize, PathBuf>,
    action_id: &str,
) -> DbResult<()> {
    if !connections.contains_key(&query.connection_index) {
        return Err(DbError::InvalidApplication(format!(
            "action '{}' uses unknown connection {}",
            action_id, query.connection_index
        )));
    }
    for child in &query.children {
        check_connections(child, connections, action_id)?;
    }
    Ok(())
}

impl ControlNamespace for Application {
    fn resolve(&self, id: &str) -> Option<&Control> {
        self.controls.get(id)
    }
}
