mod local;
mod provider;

pub use local::{ProviderLink, local_auth_router};
pub use provider::provider_router;

use webgate::{Session, SessionError};

/// Session key for one-shot messages shown on the next login page.
pub const MESSAGES_SESSION_KEY: &str = "messages";

pub(crate) fn push_message(session: &mut Session, message: &str) -> Result<(), SessionError> {
    let mut messages = session
        .get::<Vec<String>>(MESSAGES_SESSION_KEY)?
        .unwrap_or_default();
    messages.push(message.to_string());
    session.insert(MESSAGES_SESSION_KEY, messages)
}

pub(crate) fn take_messages(session: &mut Session) -> Result<Vec<String>, SessionError> {
    let messages = session
        .get::<Vec<String>>(MESSAGES_SESSION_KEY)?
        .unwrap_or_default();
    if !messages.is_empty() {
        session.remove(MESSAGES_SESSION_KEY);
    }
    Ok(messages)
}
