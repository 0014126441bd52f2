//! Where the browser gets its metadata from.

use async_trait::async_trait;
use lakedash_warehouse::{segment_path, WarehouseError, WorkspaceClient};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::CatalogError;
use crate::types::{ColumnInfo, NodePath, ObjectSummary, TableDetail};

/// Catalog metadata lookups. Each method is exactly one logical request.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn list_catalogs(&self) -> Result<Vec<ObjectSummary>, CatalogError>;

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<ObjectSummary>, CatalogError>;

    async fn list_tables(
        &self,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<ObjectSummary>, CatalogError>;

    async fn get_table(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TableDetail, CatalogError>;
}

// ── Unity Catalog REST ──────────────────────────────────────────────

const CATALOGS_PATH: &str = "/api/2.1/unity-catalog/catalogs";
const SCHEMAS_PATH: &str = "/api/2.1/unity-catalog/schemas";
const TABLES_PATH: &str = "/api/2.1/unity-catalog/tables";

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new", alias = "catalogs", alias = "schemas", alias = "tables")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    table_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableInfo {
    #[serde(default)]
    table_type: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    data_source_format: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnWire>,
}

#[derive(Debug, Deserialize)]
struct ColumnWire {
    name: String,
    #[serde(default)]
    type_text: Option<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl From<ColumnWire> for ColumnInfo {
    fn from(c: ColumnWire) -> Self {
        ColumnInfo {
            name: c.name,
            type_text: c.type_text.or(c.type_name).unwrap_or_default(),
            nullable: c.nullable,
            comment: c.comment,
        }
    }
}

/// [`MetadataSource`] backed by the Unity Catalog REST API.
pub struct UnityCatalogSource {
    workspace: WorkspaceClient,
}

impl UnityCatalogSource {
    pub fn new(workspace: WorkspaceClient) -> Self {
        Self { workspace }
    }

    /// Follow `next_page_token` until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = query.to_vec();
            if let Some(t) = token.as_deref() {
                params.push(("page_token", t));
            }
            let page: Page<T> = self.workspace.get_json(path, &params).await?;
            items.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
            debug!(path, fetched = items.len(), "Fetching next metadata page");
        }
        Ok(items)
    }
}

fn summaries(objects: Vec<NamedObject>, to_path: impl Fn(String) -> NodePath) -> Vec<ObjectSummary> {
    objects
        .into_iter()
        .filter_map(|o| {
            let name = o.name.filter(|n| !n.is_empty())?;
            Some(
                ObjectSummary::new(to_path(name))
                    .with_comment(o.comment)
                    .with_table_type(o.table_type),
            )
        })
        .collect()
}

#[async_trait]
impl MetadataSource for UnityCatalogSource {
    async fn list_catalogs(&self) -> Result<Vec<ObjectSummary>, CatalogError> {
        let objects = self.list_all::<NamedObject>(CATALOGS_PATH, &[]).await?;
        Ok(summaries(objects, |name| NodePath::catalog(name)))
    }

    async fn list_schemas(&self, catalog: &str) -> Result<Vec<ObjectSummary>, CatalogError> {
        let objects = self
            .list_all::<NamedObject>(SCHEMAS_PATH, &[("catalog_name", catalog)])
            .await?;
        Ok(summaries(objects, |name| NodePath::schema(catalog, name)))
    }

    async fn list_tables(
        &self,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<ObjectSummary>, CatalogError> {
        let objects = self
            .list_all::<NamedObject>(
                TABLES_PATH,
                &[("catalog_name", catalog), ("schema_name", schema)],
            )
            .await?;
        Ok(summaries(objects, |name| NodePath::table(catalog, schema, name)))
    }

    async fn get_table(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TableDetail, CatalogError> {
        let path = NodePath::table(catalog, schema, table);
        let info: TableInfo = self
            .workspace
            .get_json(&segment_path(TABLES_PATH, &path.to_string())?, &[])
            .await?;
        let columns: Vec<ColumnInfo> = info.columns.into_iter().map(ColumnInfo::from).collect();
        Ok(TableDetail {
            sql_reference: TableDetail::sql_reference_for(&path, &columns),
            path,
            table_type: info.table_type,
            owner: info.owner,
            data_source_format: info.data_source_format,
            comment: info.comment.filter(|c| !c.is_empty()),
            columns,
        })
    }
}

/// [`MetadataSource`] for an unconfigured workspace; every lookup fails with
/// the configuration problem.
pub struct UnavailableSource {
    error: WarehouseError,
}

impl UnavailableSource {
    pub fn new(error: WarehouseError) -> Self {
        Self { error }
    }

    fn fail<T>(&self) -> Result<T, CatalogError> {
        Err(CatalogError::Metadata(self.error.clone()))
    }
}

#[async_trait]
impl MetadataSource for UnavailableSource {
    async fn list_catalogs(&self) -> Result<Vec<ObjectSummary>, CatalogError> {
        self.fail()
    }

    async fn list_schemas(&self, _catalog: &str) -> Result<Vec<ObjectSummary>, CatalogError> {
        self.fail()
    }

    async fn list_tables(
        &self,
        _catalog: &str,
        _schema: &str,
    ) -> Result<Vec<ObjectSummary>, CatalogError> {
        self.fail()
    }

    async fn get_table(
        &self,
        _catalog: &str,
        _schema: &str,
        _table: &str,
    ) -> Result<TableDetail, CatalogError> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_decode_under_any_listing_key() {
        let page: Page<NamedObject> = serde_json::from_str(
            r#"{"schemas":[{"name":"tpch","comment":"TPC-H"},{"name":""}],"next_page_token":"p2"}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));

        let listed = summaries(page.items, |n| NodePath::schema("samples", n));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, NodePath::schema("samples", "tpch"));
        assert_eq!(listed[0].comment.as_deref(), Some("TPC-H"));
    }

    #[test]
    fn empty_listing_has_no_items() {
        let page: Page<NamedObject> = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn columns_fall_back_to_type_name() {
        let info: TableInfo = serde_json::from_str(
            r#"{
                "table_type": "MANAGED",
                "data_source_format": "DELTA",
                "columns": [
                    {"name": "o_orderkey", "type_text": "bigint", "nullable": false},
                    {"name": "o_comment", "type_name": "STRING"}
                ]
            }"#,
        )
        .unwrap();
        let cols: Vec<ColumnInfo> = info.columns.into_iter().map(ColumnInfo::from).collect();
        assert_eq!(cols[0].type_text, "bigint");
        assert!(!cols[0].nullable);
        assert_eq!(cols[1].type_text, "STRING");
        assert!(cols[1].nullable);
    }
}
