use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::errors::StorageError;

/// Persisted form of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Persistent session storage keyed by session id.
///
/// Writes replace the whole record, so concurrent requests on the same id
/// resolve as last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Load a session. Expired records are reported as absent.
    async fn load(&self, sid: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Insert or replace a session.
    async fn save(&mut self, sid: &str, record: SessionRecord) -> Result<(), StorageError>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn destroy(&mut self, sid: &str) -> Result<(), StorageError>;

    /// Drop expired records, returning how many were removed.
    async fn prune_expired(&mut self) -> Result<u64, StorageError>;
}

/// The store every request shares. All store calls from all requests go
/// through this one lock, so they run one at a time even when the backend
/// is a connection pool.
pub type SharedSessionStore = Arc<Mutex<Box<dyn SessionStore>>>;

pub fn shared_store<S: SessionStore>(store: S) -> SharedSessionStore {
    Arc::new(Mutex::new(Box::new(store)))
}
