//! Request sessions
//!
//! Sessions are owned by the transport layer. The pipeline only reads them:
//! `session` parameters receive the whole [`Session`], `session-param`
//! parameters a single key.

use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

pub mod middleware;

pub use middleware::{SessionMiddleware, SESSION_COOKIE};

/// A single session: an id plus a JSON object of values
#[derive(Debug)]
pub struct Session {
    id: String,
    data: RwLock<Map<String, Value>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: RwLock::new(Map::new()),
        }
    }

    /// Create a session with a random id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::internal("Failed to acquire write lock for session data"))?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.data.read().ok()?;
        data.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Raw value stored under `key`
    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.read().ok()?.get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.write().ok()?.remove(key)
    }

    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            data.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().map(|d| d.is_empty()).unwrap_or(true)
    }

    /// Snapshot of the session values as a JSON object
    pub fn to_value(&self) -> Value {
        self.data
            .read()
            .map(|d| Value::Object(d.clone()))
            .unwrap_or(Value::Null)
    }
}

/// Default idle time before a session expires
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct StoredSession {
    session: Arc<Session>,
    last_accessed: Instant,
}

impl StoredSession {
    fn is_expired(&self, timeout: Duration) -> bool {
        self.last_accessed.elapsed() > timeout
    }
}

/// In-memory session storage keyed by session id
///
/// Sessions idle for longer than the timeout are dropped on lookup and by
/// [`cleanup_expired`](Self::cleanup_expired), which
/// [`start_cleanup_task`](Self::start_cleanup_task) runs periodically.
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, StoredSession>>,
    session_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    pub fn with_timeout(session_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            session_timeout,
        }
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Live session for `id`, refreshing its last access time
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let mut stored = self.sessions.get_mut(id)?;
        if stored.is_expired(self.session_timeout) {
            drop(stored);
            self.sessions.remove(id);
            log::debug!("Session {} expired and removed", id);
            return None;
        }

        stored.last_accessed = Instant::now();
        Some(Arc::clone(&stored.session))
    }

    /// Create and store a fresh session
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::generate());
        self.sessions.insert(
            session.id().to_string(),
            StoredSession {
                session: Arc::clone(&session),
                last_accessed: Instant::now(),
            },
        );
        session
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Remove every expired session, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        remove_expired(&self.sessions, self.session_timeout)
    }

    /// Spawn a task running [`cleanup_expired`](Self::cleanup_expired) every
    /// `every`
    ///
    /// The task ends once the store is dropped. Must be called inside a
    /// tokio runtime.
    pub fn start_cleanup_task(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let sessions = Arc::downgrade(&self.sessions);
        let timeout = self.session_timeout;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(sessions) = sessions.upgrade() else {
                    break;
                };
                let cleaned = remove_expired(&sessions, timeout);
                if cleaned > 0 {
                    log::info!("Session store cleaned up {} expired sessions", cleaned);
                }
            }
        })
    }

    /// Stored sessions, expired ones included until they are cleaned up
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_expired(sessions: &DashMap<String, StoredSession>, timeout: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, stored| !stored.is_expired(timeout));
    before.saturating_sub(sessions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_values() {
        let session = Session::new("abc");
        session.set("user_id", 42).unwrap();
        session.set("roles", vec!["admin"]).unwrap();

        assert_eq!(session.get::<i64>("user_id"), Some(42));
        assert_eq!(session.value("roles"), Some(json!(["admin"])));
        assert_eq!(session.to_value(), json!({"user_id": 42, "roles": ["admin"]}));

        assert_eq!(session.remove("user_id"), Some(json!(42)));
        assert_eq!(session.get::<i64>("user_id"), None);
    }

    #[test]
    fn test_store_lifecycle() {
        let store = MemorySessionStore::new();
        let session = store.create();
        assert_eq!(session.id().len(), 32);
        assert!(store.get(session.id()).is_some());
        assert!(store.destroy(session.id()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_session_is_dropped_on_lookup() {
        let store = MemorySessionStore::with_timeout(Duration::from_millis(20));
        let session = store.create();

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get(session.id()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_lookup_refreshes_last_access() {
        let store = MemorySessionStore::with_timeout(Duration::from_millis(400));
        let session = store.create();

        std::thread::sleep(Duration::from_millis(250));
        assert!(store.get(session.id()).is_some());
        std::thread::sleep(Duration::from_millis(250));
        assert!(store.get(session.id()).is_some());
    }

    #[test]
    fn test_cleanup_expired() {
        let store = MemorySessionStore::with_timeout(Duration::from_millis(20));
        for _ in 0..5 {
            store.create();
        }
        std::thread::sleep(Duration::from_millis(40));
        let fresh = store.create();

        assert_eq!(store.cleanup_expired(), 5);
        assert_eq!(store.len(), 1);
        assert!(store.get(fresh.id()).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_task_evicts_idle_sessions() {
        let store = MemorySessionStore::with_timeout(Duration::from_millis(10));
        for _ in 0..3 {
            store.create();
        }
        let task = store.start_cleanup_task(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.is_empty());
        task.abort();
    }
}
