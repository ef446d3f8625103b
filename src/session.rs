//! In-memory session store.
//!
//! Sessions are keyed by `user_id::session_id` and carry a JSON state map.
//! The orchestrator caches the warehouse schema there under
//! [`DATABASE_SETTINGS_KEY`] so it is loaded once per session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::info;

/// User id applied when a request carries none.
pub const DEFAULT_USER_ID: &str = "api_user";

/// State key holding the cached [`DatabaseSettings`](crate::backend::DatabaseSettings).
pub const DATABASE_SETTINGS_KEY: &str = "database_settings";

/// A conversation session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Owning user.
    pub user_id: String,
    /// Session identifier.
    pub session_id: String,
    /// Key/value session state.
    pub state: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time the session was saved.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session. Missing ids get the defaults.
    #[must_use]
    pub fn new(user_id: Option<&str>, session_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(DEFAULT_USER_ID)
                .to_string(),
            session_id: session_id
                .filter(|s| !s.trim().is_empty())
                .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string),
            state: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Store key for this session.
    #[must_use]
    pub fn key(&self) -> String {
        session_key(&self.user_id, &self.session_id)
    }
}

fn session_key(user_id: &str, session_id: &str) -> String {
    format!("{user_id}::{session_id}")
}

/// Bounded map of sessions shared across requests.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
}

impl SessionStore {
    /// Creates a store holding at most `max_sessions` sessions (minimum 1).
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Returns the stored session, or a new unsaved one.
    pub async fn get_or_create(&self, user_id: Option<&str>, session_id: Option<&str>) -> Session {
        let fresh = Session::new(user_id, session_id);
        let sessions = self.sessions.read().await;
        sessions.get(&fresh.key()).cloned().unwrap_or(fresh)
    }

    /// Returns the stored session, if any.
    pub async fn get(&self, user_id: &str, session_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_key(user_id, session_id)).cloned()
    }

    /// Saves `session`, evicting the least recently updated one at capacity.
    pub async fn save(&self, mut session: Session) {
        session.updated_at = Utc::now();
        let key = session.key();
        let mut sessions = self.sessions.write().await;

        if !sessions.contains_key(&key) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.updated_at)
                .map(|(k, _)| k.clone());
            if let Some(evicted) = oldest {
                sessions.remove(&evicted);
                info!(evicted_key = %evicted, size = sessions.len(), "session store eviction");
            }
        }

        sessions.insert(key, session);
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no session is stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_defaults() {
        let session = Session::new(None, None);
        assert_eq!(session.user_id, DEFAULT_USER_ID);
        assert!(uuid::Uuid::parse_str(&session.session_id).is_ok());
        assert!(session.state.is_empty());

        let session = Session::new(Some(""), Some("s-1"));
        assert_eq!(session.key(), "api_user::s-1");
    }

    #[tokio::test]
    async fn test_save_and_reload_state() {
        let store = SessionStore::new(4);
        let mut session = store.get_or_create(Some("analyst"), Some("s-1")).await;
        assert!(store.is_empty().await);

        session
            .state
            .insert(DATABASE_SETTINGS_KEY.to_string(), json!({"bq_dataset_id": "h3"}));
        store.save(session).await;

        let reloaded = store.get_or_create(Some("analyst"), Some("s-1")).await;
        assert_eq!(reloaded.state[DATABASE_SETTINGS_KEY]["bq_dataset_id"], "h3");
        assert!(store.get("analyst", "s-2").await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_removes_least_recently_updated() {
        let store = SessionStore::new(2);
        store.save(Session::new(Some("u"), Some("a"))).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.save(Session::new(Some("u"), Some("b"))).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Touch "a" so "b" becomes the oldest.
        let a = store.get_or_create(Some("u"), Some("a")).await;
        store.save(a).await;
        store.save(Session::new(Some("u"), Some("c"))).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get("u", "a").await.is_some());
        assert!(store.get("u", "b").await.is_none());
        assert!(store.get("u", "c").await.is_some());
    }
}
