use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::errors::SessionError;
use crate::storage::SessionRecord;
use crate::utils::gen_random_string;

const SESSION_ID_BYTES: usize = 32;

/// Per-request view of a session.
///
/// Reads never mark the session dirty; only an actual change to its data,
/// a regenerated id, or `destroy` causes the manager to touch the store.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
    is_new: bool,
    modified: bool,
    destroyed: bool,
    previous_id: Option<String>,
}

impl Session {
    pub(crate) fn new() -> Result<Self, SessionError> {
        Ok(Self {
            id: gen_random_string(SESSION_ID_BYTES)?,
            data: Map::new(),
            is_new: true,
            modified: false,
            destroyed: false,
            previous_id: None,
        })
    }

    pub(crate) fn from_record(id: String, record: SessionRecord) -> Self {
        Self {
            id,
            data: record.data,
            is_new: false,
            modified: false,
            destroyed: false,
            previous_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True until the session has been persisted once.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        self.data
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| SessionError::Value(e.to_string()))
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value).map_err(|e| SessionError::Value(e.to_string()))?;
        if self.data.get(key) != Some(&value) {
            self.data.insert(key.to_string(), value);
            self.modified = true;
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Issue a fresh id while keeping the data. The old record is removed on commit.
    pub fn regenerate(&mut self) -> Result<(), SessionError> {
        let new_id = gen_random_string(SESSION_ID_BYTES)?;
        let old_id = std::mem::replace(&mut self.id, new_id);
        if !self.is_new && self.previous_id.is_none() {
            self.previous_id = Some(old_id);
        }
        self.modified = true;
        Ok(())
    }

    /// Drop all data; the record and cookie are removed on commit.
    pub fn destroy(&mut self) {
        self.data.clear();
        self.destroyed = true;
    }

    pub(crate) fn take_previous_id(&mut self) -> Option<String> {
        self.previous_id.take()
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
        self.modified = false;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.modified = false;
        self.destroyed = false;
        self.is_new = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_is_clean() {
        let session = Session::new().unwrap();

        assert!(session.is_new());
        assert!(!session.is_modified());
        assert!(session.data().is_empty());
        assert_eq!(session.id().len(), 43);
    }

    #[test]
    fn test_reads_do_not_mark_modified() {
        let session = Session::new().unwrap();

        let value: Option<String> = session.get("messages").unwrap();

        assert!(value.is_none());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_insert_marks_modified_only_on_change() {
        let mut session = Session::new().unwrap();
        session.insert("count", 1).unwrap();
        assert!(session.is_modified());

        session.mark_persisted();
        session.insert("count", 1).unwrap();
        assert!(!session.is_modified());

        session.insert("count", 2).unwrap();
        assert!(session.is_modified());
        assert_eq!(session.get::<i32>("count").unwrap(), Some(2));
    }

    #[test]
    fn test_remove() {
        let mut session = Session::new().unwrap();
        assert!(session.remove("absent").is_none());
        assert!(!session.is_modified());

        session.insert("k", "v").unwrap();
        session.mark_persisted();
        assert_eq!(session.remove("k"), Some(json!("v")));
        assert!(session.is_modified());
    }

    #[test]
    fn test_get_with_wrong_type_is_an_error() {
        let mut session = Session::new().unwrap();
        session.insert("k", "not a number").unwrap();

        assert!(matches!(
            session.get::<u32>("k"),
            Err(SessionError::Value(_))
        ));
    }

    #[test]
    fn test_regenerate_remembers_persisted_id_only() {
        // A never-persisted session has nothing to clean up
        let mut fresh = Session::new().unwrap();
        let fresh_id = fresh.id().to_string();
        fresh.regenerate().unwrap();
        assert_ne!(fresh.id(), fresh_id);
        assert!(fresh.take_previous_id().is_none());

        // A persisted session remembers its first id across repeated regenerations
        let mut stored = Session::new().unwrap();
        stored.mark_persisted();
        let original = stored.id().to_string();
        stored.regenerate().unwrap();
        stored.regenerate().unwrap();
        assert_eq!(stored.take_previous_id(), Some(original));
        assert!(stored.is_modified());
    }

    #[test]
    fn test_destroy_clears_data() {
        let mut session = Session::new().unwrap();
        session.insert("k", "v").unwrap();
        session.destroy();

        assert!(session.is_destroyed());
        assert!(session.data().is_empty());
    }
}
