//! Per-page browser state, keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::browser::CatalogBrowser;
use crate::error::CatalogError;
use crate::source::MetadataSource;

pub type SharedBrowser = Arc<Mutex<CatalogBrowser>>;

struct SessionEntry {
    browser: SharedBrowser,
    last_seen: Instant,
}

/// Registry of live [`CatalogBrowser`]s.
///
/// Sessions are created when the catalog page mounts and removed on unload.
/// Pages that vanish without saying goodbye are dropped by [`sweep`] once
/// idle for longer than the TTL.
///
/// [`sweep`]: CatalogSessions::sweep
pub struct CatalogSessions {
    source: Arc<dyn MetadataSource>,
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl CatalogSessions {
    pub fn new(source: Arc<dyn MetadataSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session with an empty tree.
    pub async fn create(&self) -> (Uuid, SharedBrowser) {
        let id = Uuid::new_v4();
        let browser = Arc::new(Mutex::new(CatalogBrowser::new(self.source.clone())));
        self.sessions.write().await.insert(
            id,
            SessionEntry {
                browser: browser.clone(),
                last_seen: Instant::now(),
            },
        );
        debug!(session_id = %id, "Catalog session created");
        (id, browser)
    }

    /// Look up a session and mark it as active.
    pub async fn get(&self, id: Uuid) -> Result<SharedBrowser, CatalogError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or(CatalogError::SessionNotFound(id))?;
        entry.last_seen = Instant::now();
        Ok(entry.browser.clone())
    }

    /// Drop a session. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Catalog session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove sessions idle for longer than the TTL as of `now`.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Expired idle catalog sessions");
        }
        evicted
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }
}
