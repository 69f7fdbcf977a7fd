use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{IdentityError, VerifierError};

/// The authenticated user as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

/// Converts identities to and from the blob kept in the session.
///
/// Both operations complete exactly once, with either a value or an error.
/// Implementations may suspend (e.g. to look the user up elsewhere).
#[async_trait]
pub trait UserSerializer: Send + Sync + 'static {
    async fn serialize(&self, user: &UserIdentity) -> Result<Value, IdentityError>;

    async fn deserialize(&self, stored: Value) -> Result<UserIdentity, IdentityError>;
}

/// Checks a username/password pair.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// `Ok(None)` means the credentials were rejected.
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserIdentity>, VerifierError>;
}

/// Client of a third-party identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Short provider name used in logs and views, e.g. "google".
    fn name(&self) -> &str;

    /// Where to send the browser to start authentication.
    fn authorization_url(&self, state: &str) -> Result<String, VerifierError>;

    /// Exchange the callback code for the user's identity.
    async fn exchange(&self, code: &str) -> Result<UserIdentity, VerifierError>;
}
