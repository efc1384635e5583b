//! Per-browser session state
//!
//! A session holds the CSV staged by an upload and the latest search result
//! set. Sessions are keyed by the UUID the browser sends in `x-session-id`
//! and expire after a period without use; expired sessions are purged
//! lazily whenever the store is touched.

use chrono::{DateTime, Utc};
use pcoq_common::csv::CsvTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::SearchResultSet;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    last_used: Instant,
    /// Rows of the most recent upload
    pub staged: Option<CsvTable>,
    /// Replaced wholesale by every store
    pub results: Option<SearchResultSet>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_used: Instant::now(),
            staged: None,
            results: None,
        }
    }
}

/// Shared map of live sessions
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn purge_locked(&self, sessions: &mut HashMap<Uuid, Session>) -> usize {
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, session| session.last_used.elapsed() < ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "Purged expired sessions");
        }
        purged
    }

    /// Drop sessions idle longer than the TTL, returning how many went
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.purge_locked(&mut sessions)
    }

    /// Start a new empty session
    pub async fn create(&self) -> Uuid {
        let mut sessions = self.sessions.write().await;
        self.purge_locked(&mut sessions);

        let id = Uuid::new_v4();
        sessions.insert(id, Session::new(id));
        info!(session_id = %id, "Session created");
        id
    }

    /// Run `f` against a live session, refreshing its idle timer
    ///
    /// `None` when the session does not exist or has expired.
    pub async fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        self.purge_locked(&mut sessions);

        let session = sessions.get_mut(&id)?;
        session.last_used = Instant::now();
        Some(f(session))
    }

    /// Clone of a live session
    pub async fn snapshot(&self, id: Uuid) -> Option<Session> {
        self.with_session(id, |session| session.clone()).await
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
