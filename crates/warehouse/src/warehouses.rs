//! SQL warehouse references and the selection policy used by discovery.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the warehouses API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseState {
    Running,
    Starting,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for WarehouseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarehouseState::Running => "RUNNING",
            WarehouseState::Starting => "STARTING",
            WarehouseState::Stopping => "STOPPING",
            WarehouseState::Stopped => "STOPPED",
            WarehouseState::Deleting => "DELETING",
            WarehouseState::Deleted => "DELETED",
            WarehouseState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A SQL warehouse the app can run statements on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: WarehouseState,
    #[serde(default, alias = "enable_serverless_compute")]
    pub serverless: bool,
}

impl WarehouseRef {
    /// A warehouse pinned by configuration. Its state is not looked up.
    pub fn pinned(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            state: WarehouseState::Unknown,
            serverless: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == WarehouseState::Running
    }

    /// JDBC/ODBC style HTTP path, shown on the pages for reference.
    pub fn http_path(&self) -> String {
        format!("/sql/1.0/warehouses/{}", self.id)
    }
}

/// `GET /api/2.0/sql/warehouses` payload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListWarehousesResponse {
    #[serde(default)]
    pub warehouses: Vec<WarehouseRef>,
}

/// Pick the warehouse discovery should use.
///
/// Order: running serverless, any running, serverless (starts in seconds),
/// then whatever was listed first. Deleted or deleting warehouses are never
/// chosen.
pub fn select_warehouse(warehouses: &[WarehouseRef]) -> Option<&WarehouseRef> {
    let usable: Vec<&WarehouseRef> = warehouses
        .iter()
        .filter(|w| !matches!(w.state, WarehouseState::Deleted | WarehouseState::Deleting))
        .collect();

    usable
        .iter()
        .find(|w| w.is_running() && w.serverless)
        .or_else(|| usable.iter().find(|w| w.is_running()))
        .or_else(|| usable.iter().find(|w| w.serverless))
        .or_else(|| usable.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wh(id: &str, state: WarehouseState, serverless: bool) -> WarehouseRef {
        WarehouseRef { id: id.into(), name: None, state, serverless }
    }

    #[test]
    fn running_beats_stopped() {
        let list = vec![
            wh("w1", WarehouseState::Stopped, false),
            wh("w2", WarehouseState::Running, false),
        ];
        assert_eq!(select_warehouse(&list).unwrap().id, "w2");
    }

    #[test]
    fn running_serverless_beats_running_classic() {
        let list = vec![
            wh("classic", WarehouseState::Running, false),
            wh("sls", WarehouseState::Running, true),
        ];
        assert_eq!(select_warehouse(&list).unwrap().id, "sls");
    }

    #[test]
    fn running_classic_beats_stopped_serverless() {
        let list = vec![
            wh("sls", WarehouseState::Stopped, true),
            wh("classic", WarehouseState::Running, false),
        ];
        assert_eq!(select_warehouse(&list).unwrap().id, "classic");
    }

    #[test]
    fn falls_back_to_serverless_then_first() {
        let list = vec![
            wh("a", WarehouseState::Stopped, false),
            wh("b", WarehouseState::Stopped, true),
        ];
        assert_eq!(select_warehouse(&list).unwrap().id, "b");

        let list = vec![
            wh("a", WarehouseState::Stopped, false),
            wh("b", WarehouseState::Starting, false),
        ];
        assert_eq!(select_warehouse(&list).unwrap().id, "a");
    }

    #[test]
    fn deleted_warehouses_are_skipped() {
        let list = vec![wh("gone", WarehouseState::Deleted, true)];
        assert!(select_warehouse(&list).is_none());
        assert!(select_warehouse(&[]).is_none());
    }

    #[test]
    fn deserializes_api_payload() {
        let json = r#"{"warehouses":[
            {"id":"w1","name":"Starter","state":"STOPPED","enable_serverless_compute":true,"cluster_size":"2X-Small"},
            {"id":"w2","state":"SOMETHING_NEW"}
        ]}"#;
        let resp: ListWarehousesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.warehouses.len(), 2);
        assert_eq!(resp.warehouses[0].state, WarehouseState::Stopped);
        assert!(resp.warehouses[0].serverless);
        assert_eq!(resp.warehouses[1].state, WarehouseState::Unknown);
        assert!(!resp.warehouses[1].serverless);
    }

    #[test]
    fn pinned_reference() {
        let w = WarehouseRef::pinned("abc123");
        assert_eq!(w.state, WarehouseState::Unknown);
        assert_eq!(w.http_path(), "/sql/1.0/warehouses/abc123");
    }
}
