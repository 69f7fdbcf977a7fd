mod errors;
mod memory;
mod sqlite;
mod types;

pub use errors::StorageError;
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use types::{SessionRecord, SessionStore, SharedSessionStore, shared_store};

use crate::config::SessionStoreKind;

/// Build the session store selected by configuration.
pub async fn build_session_store(
    kind: &SessionStoreKind,
) -> Result<SharedSessionStore, StorageError> {
    tracing::info!("Initializing session store: {:?}", kind);

    let store = match kind {
        SessionStoreKind::Sqlite { dir, db } => {
            shared_store(SqliteSessionStore::connect(&dir.join(db)).await?)
        }
        SessionStoreKind::Memory => shared_store(InMemorySessionStore::new()),
    };
    Ok(store)
}
