//! Unity Catalog lookups against a local workspace served by axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use lakedash_catalog::{MetadataSource, NodePath, UnityCatalogSource};
use lakedash_warehouse::{Credentials, WorkspaceClient};

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn start(router: Router) -> UnityCatalogSource {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let workspace = WorkspaceClient::new(format!("http://{addr}"), Credentials::Token("t".into()));
    UnityCatalogSource::new(workspace)
}

async fn schemas(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    seen.lock().unwrap().push(params.clone());
    match params.get("page_token").map(String::as_str) {
        None => Json(json!({
            "schemas": [{"name": "tpch", "comment": "TPC-H"}, {"name": "nyctaxi"}],
            "next_page_token": "page-2"
        })),
        Some("page-2") => Json(json!({
            "schemas": [{"name": "information_schema"}],
            "next_page_token": ""
        })),
        Some(_) => Json(json!({"schemas": []})),
    }
}

#[tokio::test]
async fn listing_follows_next_page_token() {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/api/2.1/unity-catalog/schemas", get(schemas))
        .with_state(seen.clone());
    let source = start(router).await;

    let listed = source.list_schemas("samples").await.unwrap();

    let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["tpch", "nyctaxi", "information_schema"]);
    assert_eq!(listed[0].path, NodePath::schema("samples", "tpch"));
    assert_eq!(listed[0].comment.as_deref(), Some("TPC-H"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| p.get("catalog_name").map(String::as_str) == Some("samples")));
    assert_eq!(seen[0].get("page_token"), None);
    assert_eq!(seen[1].get("page_token").map(String::as_str), Some("page-2"));
}

#[tokio::test]
async fn single_page_listing_makes_one_request() {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route(
            "/api/2.1/unity-catalog/catalogs",
            get(|State(seen): State<Seen>| async move {
                seen.lock().unwrap().push(HashMap::new());
                Json(json!({"catalogs": [{"name": "main"}, {"name": "samples"}]}))
            }),
        )
        .with_state(seen.clone());
    let source = start(router).await;

    let listed = source.list_catalogs().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].path, NodePath::catalog("samples"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn table_lookup_sends_the_full_name_as_one_segment() {
    let router = Router::new().route(
        "/api/2.1/unity-catalog/tables/{full_name}",
        get(|Path(full_name): Path<String>| async move {
            Json(json!({
                "table_type": "MANAGED",
                "comment": full_name,
                "columns": [{"name": "id", "type_text": "bigint", "nullable": false}]
            }))
        }),
    );
    let source = start(router).await;

    let detail = source
        .get_table("main", "q1/reports", "orders#draft?v=2")
        .await
        .unwrap();

    // The server saw the exact name.
    assert_eq!(detail.comment.as_deref(), Some("main.q1/reports.orders#draft?v=2"));
    assert_eq!(detail.table_type.as_deref(), Some("MANAGED"));
    assert_eq!(detail.columns.len(), 1);
    assert_eq!(detail.path, NodePath::table("main", "q1/reports", "orders#draft?v=2"));
}

#[tokio::test]
async fn missing_table_is_a_metadata_error() {
    let source = start(Router::new()).await;
    let err = source.get_table("main", "default", "gone").await.unwrap_err();
    assert!(!err.is_connection(), "404 is not a connection failure: {err:?}");
}
