//! Lazily loaded catalog → schema → table → column tree for one page session.
//!
//! Children are fetched on the first expansion of a node and cached for the
//! lifetime of the browser. Collapsing only hides them, so re-expanding is
//! free. A failed fetch leaves the node collapsed and uncached; the next click
//! simply tries again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::source::MetadataSource;
use crate::types::{
    Children, NodePath, ObjectSummary, TableDetail, TreeAction, TreeEntry, TreeEvent,
    VisibleNode, SAMPLES_CATALOG,
};

/// Result of dispatching a [`TreeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventOutcome {
    pub path: NodePath,
    pub expanded: bool,
    /// Children of `path` when it ended up expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,
}

pub struct CatalogBrowser {
    source: Arc<dyn MetadataSource>,
    catalogs: Option<Vec<ObjectSummary>>,
    children: HashMap<NodePath, Children>,
    details: HashMap<NodePath, TableDetail>,
    expanded: HashSet<NodePath>,
}

impl CatalogBrowser {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            catalogs: None,
            children: HashMap::new(),
            details: HashMap::new(),
            expanded: HashSet::new(),
        }
    }

    /// Top-level catalogs, `samples` first. Fetched once per browser.
    pub async fn list_catalogs(&mut self) -> Result<&[ObjectSummary], CatalogError> {
        if self.catalogs.is_none() {
            let mut catalogs = self.source.list_catalogs().await?;
            if let Some(pos) = catalogs.iter().position(|c| c.name == SAMPLES_CATALOG) {
                let samples = catalogs.remove(pos);
                catalogs.insert(0, samples);
            }
            debug!(count = catalogs.len(), "Loaded catalogs");
            self.catalogs = Some(catalogs);
        }
        Ok(self.catalogs.as_deref().unwrap_or_default())
    }

    /// Mark `path` expanded, fetching its children on first expansion.
    pub async fn expand(&mut self, path: &NodePath) -> Result<&Children, CatalogError> {
        if !self.children.contains_key(path) {
            let children = match self.fetch_children(path).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to load catalog node");
                    return Err(e);
                }
            };
            debug!(path = %path, count = children.len(), "Loaded catalog node");
            self.children.insert(path.clone(), children);
        }
        self.expanded.insert(path.clone());
        Ok(&self.children[path])
    }

    /// Hide the children of `path`. Returns whether it was expanded.
    pub fn collapse(&mut self, path: &NodePath) -> bool {
        self.expanded.remove(path)
    }

    pub fn is_expanded(&self, path: &NodePath) -> bool {
        self.expanded.contains(path)
    }

    /// Whether the children of `path` are already loaded.
    pub fn is_cached(&self, path: &NodePath) -> bool {
        self.children.contains_key(path)
    }

    pub fn children(&self, path: &NodePath) -> Option<&Children> {
        self.children.get(path)
    }

    /// Dispatch a node click.
    pub async fn handle(&mut self, event: &TreeEvent) -> Result<EventOutcome, CatalogError> {
        let expand = match event.action {
            TreeAction::Expand => true,
            TreeAction::Collapse => false,
            TreeAction::Toggle => !self.is_expanded(&event.path),
        };

        if expand {
            let children = self.expand(&event.path).await?.clone();
            Ok(EventOutcome {
                path: event.path.clone(),
                expanded: true,
                children: Some(children),
            })
        } else {
            self.collapse(&event.path);
            Ok(EventOutcome {
                path: event.path.clone(),
                expanded: false,
                children: None,
            })
        }
    }

    /// Table metadata plus a reference query. Shares the cache with
    /// expansion, so expanding a table and opening its detail is one call.
    pub async fn table_detail(&mut self, path: &NodePath) -> Result<&TableDetail, CatalogError> {
        let NodePath::Table {
            catalog,
            schema,
            table,
        } = path
        else {
            return Err(CatalogError::NotATable(path.clone()));
        };

        if !self.details.contains_key(path) {
            let detail = self.source.get_table(catalog, schema, table).await?;
            self.children
                .insert(path.clone(), Children::Columns(detail.columns.clone()));
            self.details.insert(path.clone(), detail);
        }
        Ok(&self.details[path])
    }

    /// Flattened tree in display order. Expanded nodes contribute their
    /// cached children one level deeper.
    pub fn visible_nodes(&self) -> Vec<VisibleNode> {
        let mut out = Vec::new();
        for catalog in self.catalogs.as_deref().unwrap_or_default() {
            self.push_node(&catalog.path, &mut out);
        }
        out
    }

    fn push_node(&self, path: &NodePath, out: &mut Vec<VisibleNode>) {
        let expanded = self.is_expanded(path);
        out.push(VisibleNode {
            depth: path.depth(),
            entry: TreeEntry::Node {
                path: path.clone(),
                name: path.name().to_string(),
                expanded,
            },
        });
        if !expanded {
            return;
        }

        match self.children.get(path) {
            Some(Children::Schemas(items)) | Some(Children::Tables(items)) => {
                for item in items {
                    self.push_node(&item.path, out);
                }
            }
            Some(Children::Columns(columns)) => {
                for col in columns {
                    out.push(VisibleNode {
                        depth: path.depth() + 1,
                        entry: TreeEntry::Column {
                            table: path.clone(),
                            name: col.name.clone(),
                            type_text: col.type_text.clone(),
                        },
                    });
                }
            }
            None => {}
        }
    }

    async fn fetch_children(&mut self, path: &NodePath) -> Result<Children, CatalogError> {
        match path {
            NodePath::Catalog { catalog } => {
                Ok(Children::Schemas(self.source.list_schemas(catalog).await?))
            }
            NodePath::Schema { catalog, schema } => Ok(Children::Tables(
                self.source.list_tables(catalog, schema).await?,
            )),
            NodePath::Table {
                catalog,
                schema,
                table,
            } => {
                let detail = self.source.get_table(catalog, schema, table).await?;
                let columns = detail.columns.clone();
                self.details.insert(path.clone(), detail);
                Ok(Children::Columns(columns))
            }
        }
    }
}
