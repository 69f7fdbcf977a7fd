use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::errors::StorageError;
use super::types::{SessionRecord, SessionStore};

const SESSIONS_TABLE: &str = "sessions";

/// Durable session store backed by a SQLite file.
#[derive(Clone, Debug)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database at `path` and ensure the table exists.
    pub async fn connect(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        tracing::info!("Connected to session database at {}", path.display());

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// A private in-memory database, mostly useful in tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SESSIONS_TABLE} (
                sid TEXT PRIMARY KEY NOT NULL,
                expired INTEGER NOT NULL,
                sess TEXT NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, sid: &str) -> Result<Option<SessionRecord>, StorageError> {
        let sess = sqlx::query_scalar::<_, String>(&format!(
            "SELECT sess FROM {SESSIONS_TABLE} WHERE sid = ? AND expired > ?"
        ))
        .bind(sid)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        sess.map(|s| serde_json::from_str(&s).map_err(StorageError::from))
            .transpose()
    }

    async fn save(&mut self, sid: &str, record: SessionRecord) -> Result<(), StorageError> {
        let sess = serde_json::to_string(&record)?;
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {SESSIONS_TABLE} (sid, expired, sess) VALUES (?, ?, ?)"
        ))
        .bind(sid)
        .bind(record.expires_at.timestamp_millis())
        .bind(sess)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn destroy(&mut self, sid: &str) -> Result<(), StorageError> {
        sqlx::query(&format!("DELETE FROM {SESSIONS_TABLE} WHERE sid = ?"))
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_expired(&mut self) -> Result<u64, StorageError> {
        let result = sqlx::query(&format!("DELETE FROM {SESSIONS_TABLE} WHERE expired <= ?"))
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
