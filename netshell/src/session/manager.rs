//! Session registry with label reuse and age-based expiry.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Session;
use crate::driver::{DeviceType, SessionConfig};
use crate::error::{Result, SessionError};

/// Sessions older than this are closed by [`SessionManager::cleanup_expired`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(7200);

struct Entry {
    session: Arc<Session>,
    created_at: Instant,
}

/// One line of [`SessionManager::list_sessions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub device_type: DeviceType,
    pub connected: bool,
    pub age_seconds: u64,
}

/// Owns every live session, keyed by id or caller-chosen label.
///
/// Lookups hand out `Arc<Session>` so callers never hold the registry lock
/// while talking to a device; sessions are closed after being unlinked.
pub struct SessionManager {
    sessions: RwLock<IndexMap<String, Entry>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(IndexMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Connect and register a session.
    ///
    /// A session already registered under `label` is closed first. Without a
    /// label a short random id is generated.
    pub async fn create_session(
        &self,
        config: SessionConfig,
        label: Option<String>,
    ) -> Result<String> {
        let id = label.unwrap_or_else(new_session_id);

        if let Some(previous) = self.unlink(&id).await {
            info!("replacing session {}", id);
            close_logged(&id, previous).await;
        }

        let session = Session::connect(config).await?;
        Ok(self.insert(id, session).await)
    }

    /// Register an already-open session.
    pub async fn register(&self, session: Session, label: Option<String>) -> String {
        let id = label.unwrap_or_else(new_session_id);
        self.insert(id, session).await
    }

    async fn insert(&self, id: String, session: Session) -> String {
        let entry = Entry {
            session: Arc::new(session),
            created_at: Instant::now(),
        };

        let previous = {
            let mut sessions = self.sessions.write().await;
            let previous = sessions.shift_remove(&id);
            sessions.insert(id.clone(), entry);
            previous
        };

        // Two creates raced on one label; the later one wins
        if let Some(previous) = previous {
            close_logged(&id, previous.session).await;
        }

        debug!("registered session {}", id);
        id
    }

    async fn unlink(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .write()
            .await
            .shift_remove(id)
            .map(|entry| entry.session)
    }

    /// Look up a session by id.
    pub async fn get_session(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()).into())
    }

    /// Unregister and close a session.
    pub async fn close_session(&self, id: &str) -> Result<()> {
        let session = self
            .unlink(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        info!("closing session {}", id);
        session.close().await
    }

    /// Snapshot of every registered session, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, entry)| {
                let info = entry.session.info();
                SessionSummary {
                    session_id: id.clone(),
                    host: info.host.clone(),
                    port: info.port,
                    username: info.username.clone(),
                    device_type: info.device_type,
                    connected: entry.session.is_connected(),
                    age_seconds: entry.created_at.elapsed().as_secs(),
                }
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close every session older than the TTL. Returns the ids removed.
    pub async fn cleanup_expired(&self) -> Vec<String> {
        let expired: Vec<(String, Arc<Session>)> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.created_at.elapsed() >= self.ttl)
                .map(|(id, _)| id.clone())
                .collect();

            ids.into_iter()
                .filter_map(|id| sessions.shift_remove(&id).map(|entry| (id, entry.session)))
                .collect()
        };

        for (id, session) in &expired {
            info!("session {} expired", id);
            close_logged(id, session.clone()).await;
        }

        expired.into_iter().map(|(id, _)| id).collect()
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = manager.cleanup_expired().await;
                        if !removed.is_empty() {
                            debug!("reaper closed {} sessions", removed.len());
                        }
                    }
                }
            }
        })
    }

    /// Close and unregister everything.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<Session>)> = self
            .sessions
            .write()
            .await
            .drain(..)
            .map(|(id, entry)| (id, entry.session))
            .collect();

        info!("closing {} sessions", drained.len());
        join_all(
            drained
                .into_iter()
                .map(|(id, session)| async move { close_logged(&id, session).await }),
        )
        .await;
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn new_session_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

async fn close_logged(id: &str, session: Arc<Session>) {
    if let Err(e) = session.close().await {
        warn!("error closing session {}: {}", id, e);
    }
}
