use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// The session store could not be reached or returned garbage.
    #[error("Session store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session value error: {0}")]
    Value(String),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
