use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::errors::IdentityError;
use super::types::{UserIdentity, UserSerializer};
use crate::session::Session;

/// Session key under which the serialized user is kept, as `{"user": ...}`.
pub const AUTH_SESSION_KEY: &str = "passport";

/// Stores the identity unchanged, completing on the next scheduler turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughSerializer;

#[async_trait]
impl UserSerializer for PassThroughSerializer {
    async fn serialize(&self, user: &UserIdentity) -> Result<Value, IdentityError> {
        tokio::task::yield_now().await;
        serde_json::to_value(user).map_err(|e| IdentityError::Serialize(e.to_string()))
    }

    async fn deserialize(&self, stored: Value) -> Result<UserIdentity, IdentityError> {
        tokio::task::yield_now().await;
        serde_json::from_value(stored).map_err(|e| IdentityError::Deserialize(e.to_string()))
    }
}

/// Moves the authenticated identity in and out of the session.
#[derive(Clone)]
pub struct AuthStateManager {
    serializer: Arc<dyn UserSerializer>,
}

impl AuthStateManager {
    pub fn new(serializer: Arc<dyn UserSerializer>) -> Self {
        Self { serializer }
    }

    /// The user recorded in the session, if any.
    ///
    /// A blob that fails to deserialize is an error, never an anonymous user.
    pub async fn current_user(
        &self,
        session: &Session,
    ) -> Result<Option<UserIdentity>, IdentityError> {
        let Some(stored) = session
            .get_value(AUTH_SESSION_KEY)
            .and_then(|auth| auth.get("user"))
            .cloned()
        else {
            return Ok(None);
        };
        self.serializer.deserialize(stored).await.map(Some)
    }

    /// Record `user` as authenticated, under a fresh session id.
    pub async fn login(
        &self,
        session: &mut Session,
        user: &UserIdentity,
    ) -> Result<(), IdentityError> {
        let stored = self.serializer.serialize(user).await?;
        session.regenerate()?;
        session.insert(AUTH_SESSION_KEY, json!({ "user": stored }))?;
        tracing::debug!("User {} logged in", user.id);
        Ok(())
    }

    /// Forget the authenticated user. Returns whether one was present.
    pub fn logout(&self, session: &mut Session) -> Result<bool, IdentityError> {
        let was_logged_in = session.remove(AUTH_SESSION_KEY).is_some();
        if was_logged_in {
            session.regenerate()?;
        }
        Ok(was_logged_in)
    }
}
