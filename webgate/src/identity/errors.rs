use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error, Clone)]
pub enum IdentityError {
    #[error("Failed to serialize user: {0}")]
    Serialize(String),

    #[error("Failed to deserialize user: {0}")]
    Deserialize(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Failures reported by credential verifiers and identity providers.
#[derive(Debug, Error, Clone)]
pub enum VerifierError {
    #[error("Credential verifier unavailable: {0}")]
    Unavailable(String),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Invalid authorization state")]
    InvalidState,
}
