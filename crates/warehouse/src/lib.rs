pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod manager;
pub mod result;
pub mod statement;
pub mod warehouses;
pub mod workspace;

pub use api::{HttpWarehouseApi, SqlSession, UnavailableApi, WarehouseApi};
pub use auth::Credentials;
pub use client::HttpSession;
pub use error::WarehouseError;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use result::{escape_csv, Column, QueryMetadata, QueryResult};
pub use statement::{Params, Statement};
pub use warehouses::{select_warehouse, WarehouseRef, WarehouseState};
pub use workspace::{segment_path, WorkspaceClient};
