pub mod browser;
pub mod error;
pub mod sessions;
pub mod source;
pub mod types;

pub use browser::{CatalogBrowser, EventOutcome};
pub use error::CatalogError;
pub use sessions::{CatalogSessions, SharedBrowser};
pub use source::{MetadataSource, UnavailableSource, UnityCatalogSource};
pub use types::{
    Children, ColumnInfo, NodePath, ObjectSummary, TableDetail, TreeAction, TreeEntry, TreeEvent,
    VisibleNode,
};
