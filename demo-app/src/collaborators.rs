//! Stand-in collaborators so the demo runs without external services.

use std::collections::HashMap;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use webgate_axum::webgate::{CredentialVerifier, IdentityProvider, UserIdentity, VerifierError};

/// Username/password pairs from `DEMO_USERS`, e.g. `alice:wonderland,bob:builder`.
pub(crate) struct DemoVerifier {
    users: HashMap<String, String>,
}

impl DemoVerifier {
    pub(crate) fn from_env() -> Self {
        let users = std::env::var("DEMO_USERS")
            .map(|users| Self::parse(&users))
            .unwrap_or_default();
        if users.is_empty() {
            tracing::warn!("DEMO_USERS is empty; password login will reject everyone");
        }
        Self { users }
    }

    fn parse(users: &str) -> HashMap<String, String> {
        users
            .split(',')
            .filter_map(|pair| pair.trim().split_once(':'))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, password)| (name.to_string(), password.to_string()))
            .collect()
    }
}

#[async_trait]
impl CredentialVerifier for DemoVerifier {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserIdentity>, VerifierError> {
        let Some(expected) = self.users.get(username) else {
            return Ok(None);
        };
        if !bool::from(expected.as_bytes().ct_eq(password.as_bytes())) {
            return Ok(None);
        }
        Ok(Some(UserIdentity {
            id: format!("local:{username}"),
            name: username.to_string(),
        }))
    }
}

/// Provider that approves every sign-in by redirecting straight back to
/// its own callback.
pub(crate) struct DemoProvider {
    name: String,
    callback: String,
}

impl DemoProvider {
    pub(crate) fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            callback: format!("{prefix}/callback"),
        }
    }
}

#[async_trait]
impl IdentityProvider for DemoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &str) -> Result<String, VerifierError> {
        Ok(format!(
            "{}?code={}&state={}",
            self.callback,
            urlencoding::encode(&format!("demo-{}", self.name)),
            urlencoding::encode(state)
        ))
    }

    async fn exchange(&self, code: &str) -> Result<UserIdentity, VerifierError> {
        if code != format!("demo-{}", self.name) {
            return Err(VerifierError::Provider(format!("unknown code '{code}'")));
        }
        Ok(UserIdentity {
            id: format!("{}:demo", self.name),
            name: format!("Demo {} user", self.name),
        })
    }
}
