use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the catalog shown first in the browser when present.
pub const SAMPLES_CATALOG: &str = "samples";

/// Position of an expandable node in the catalog → schema → table hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePath {
    Catalog {
        catalog: String,
    },
    Schema {
        catalog: String,
        schema: String,
    },
    Table {
        catalog: String,
        schema: String,
        table: String,
    },
}

impl NodePath {
    pub fn catalog(catalog: impl Into<String>) -> Self {
        NodePath::Catalog {
            catalog: catalog.into(),
        }
    }

    pub fn schema(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        NodePath::Schema {
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    pub fn table(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        NodePath::Table {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Last path segment, the label shown in the tree.
    pub fn name(&self) -> &str {
        match self {
            NodePath::Catalog { catalog } => catalog,
            NodePath::Schema { schema, .. } => schema,
            NodePath::Table { table, .. } => table,
        }
    }

    /// Tree depth: catalogs are 0, schemas 1, tables 2.
    pub fn depth(&self) -> usize {
        match self {
            NodePath::Catalog { .. } => 0,
            NodePath::Schema { .. } => 1,
            NodePath::Table { .. } => 2,
        }
    }

    /// Dotted three-level name, e.g. `samples.tpch.orders`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    pub fn is_table(&self) -> bool {
        matches!(self, NodePath::Table { .. })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePath::Catalog { catalog } => write!(f, "{catalog}"),
            NodePath::Schema { catalog, schema } => write!(f, "{catalog}.{schema}"),
            NodePath::Table {
                catalog,
                schema,
                table,
            } => write!(f, "{catalog}.{schema}.{table}"),
        }
    }
}

/// A catalog, schema or table as listed by the metadata service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub path: NodePath,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Table type (`MANAGED`, `EXTERNAL`, `VIEW`, ...); tables only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
}

impl ObjectSummary {
    pub fn new(path: NodePath) -> Self {
        Self {
            name: path.name().to_string(),
            path,
            comment: None,
            table_type: None,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment.filter(|c| !c.is_empty());
        self
    }

    pub fn with_table_type(mut self, table_type: Option<String>) -> Self {
        self.table_type = table_type;
        self
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in DDL, e.g. `decimal(18,2)`.
    pub type_text: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Everything the table detail panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDetail {
    pub path: NodePath,
    pub table_type: Option<String>,
    pub owner: Option<String>,
    pub data_source_format: Option<String>,
    pub comment: Option<String>,
    pub columns: Vec<ColumnInfo>,
    /// Ready-to-run query over the table.
    pub sql_reference: String,
}

impl TableDetail {
    /// Build the `SELECT <cols> FROM c.s.t LIMIT 100` reference query.
    pub fn sql_reference_for(path: &NodePath, columns: &[ColumnInfo]) -> String {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("SELECT {cols}\nFROM {path}\nLIMIT 100")
    }
}

/// Cached children of an expanded node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Children {
    Schemas(Vec<ObjectSummary>),
    Tables(Vec<ObjectSummary>),
    Columns(Vec<ColumnInfo>),
}

impl Children {
    pub fn len(&self) -> usize {
        match self {
            Children::Schemas(items) | Children::Tables(items) => items.len(),
            Children::Columns(cols) => cols.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a click on a tree node asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeAction {
    Toggle,
    Expand,
    Collapse,
}

/// A node click sent by the browser page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEvent {
    pub action: TreeAction,
    pub path: NodePath,
}

/// One row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEntry {
    Node {
        path: NodePath,
        name: String,
        expanded: bool,
    },
    Column {
        table: NodePath,
        name: String,
        type_text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleNode {
    pub depth: usize,
    #[serde(flatten)]
    pub entry: TreeEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_render_dotted() {
        assert_eq!(NodePath::catalog("samples").to_string(), "samples");
        assert_eq!(NodePath::schema("samples", "tpch").full_name(), "samples.tpch");
        let t = NodePath::table("samples", "tpch", "orders");
        assert_eq!(t.to_string(), "samples.tpch.orders");
        assert_eq!(t.name(), "orders");
        assert_eq!(t.depth(), 2);
        assert!(t.is_table());
    }

    #[test]
    fn events_deserialize_from_page_payload() {
        let ev: TreeEvent = serde_json::from_str(
            r#"{"action":"toggle","path":{"kind":"schema","catalog":"samples","schema":"nyctaxi"}}"#,
        )
        .unwrap();
        assert_eq!(ev.action, TreeAction::Toggle);
        assert_eq!(ev.path, NodePath::schema("samples", "nyctaxi"));
    }

    #[test]
    fn sql_reference_lists_columns_or_star() {
        let path = NodePath::table("samples", "tpch", "region");
        let cols = vec![
            ColumnInfo {
                name: "r_regionkey".into(),
                type_text: "bigint".into(),
                nullable: true,
                comment: None,
            },
            ColumnInfo {
                name: "r_name".into(),
                type_text: "string".into(),
                nullable: true,
                comment: None,
            },
        ];
        assert_eq!(
            TableDetail::sql_reference_for(&path, &cols),
            "SELECT r_regionkey, r_name\nFROM samples.tpch.region\nLIMIT 100"
        );
        assert_eq!(
            TableDetail::sql_reference_for(&path, &[]),
            "SELECT *\nFROM samples.tpch.region\nLIMIT 100"
        );
    }

    #[test]
    fn visible_node_serializes_flat() {
        let node = VisibleNode {
            depth: 1,
            entry: TreeEntry::Node {
                path: NodePath::schema("main", "default"),
                name: "default".into(),
                expanded: false,
            },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["depth"], 1);
        assert_eq!(json["type"], "node");
        assert_eq!(json["path"]["kind"], "schema");
        assert_eq!(json["expanded"], false);
    }
}
