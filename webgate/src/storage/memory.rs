use async_trait::async_trait;
use std::collections::HashMap;

use super::errors::StorageError;
use super::types::{SessionRecord, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    entry: HashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory session store");
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn load(&self, sid: &str) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self
            .entry
            .get(sid)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn save(&mut self, sid: &str, record: SessionRecord) -> Result<(), StorageError> {
        self.entry.insert(sid.to_string(), record);
        Ok(())
    }

    async fn destroy(&mut self, sid: &str) -> Result<(), StorageError> {
        self.entry.remove(sid);
        Ok(())
    }

    async fn prune_expired(&mut self) -> Result<u64, StorageError> {
        let before = self.entry.len();
        self.entry.retain(|_, record| !record.is_expired());
        Ok((before - self.entry.len()) as u64)
    }
}
