use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        // Given a StorageError with a Storage variant
        let error = StorageError::Storage("Connection failed".to_string());

        // Then it should format correctly
        assert_eq!(error.to_string(), "Storage error: Connection failed");
    }

    #[test]
    fn test_from_sqlx_error() {
        // Given a sqlx error
        let err = sqlx::Error::PoolTimedOut;

        // When converting to StorageError
        let storage_error = StorageError::from(err);

        // Then it should be a Storage variant
        assert!(matches!(storage_error, StorageError::Storage(_)));
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();

        match StorageError::from(serde_error) {
            StorageError::Serde(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Serde variant, got {other:?}"),
        }
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<StorageError>();
    }
}
