use chrono::{Duration, Utc};
use http::HeaderMap;

use super::errors::SessionError;
use super::types::Session;
use crate::config::SessionConfig;
use crate::storage::{SessionRecord, SharedSessionStore};
use crate::utils::{get_cookie, header_set_cookie, sign_value, unsign_value};

/// Restores sessions from signed cookies and writes back the dirty ones.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedSessionStore,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: SharedSessionStore, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Look up the session referenced by the request cookie.
    ///
    /// A missing cookie, a bad signature, or an unknown/expired id all yield
    /// a fresh, unpersisted session. Only a store failure is an error.
    pub async fn restore(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let Some(cookie) = get_cookie(headers, &self.config.cookie_name) else {
            tracing::debug!("No session cookie, starting a new session");
            return Session::new();
        };

        let Some(sid) = unsign_value(self.config.secret.as_bytes(), &cookie) else {
            tracing::debug!("Session cookie signature invalid, starting a new session");
            return Session::new();
        };

        let record = self.store.lock().await.load(sid).await?;

        match record {
            Some(record) => Ok(Session::from_record(sid.to_string(), record)),
            None => {
                tracing::debug!("Session not found or expired, starting a new session");
                Session::new()
            }
        }
    }

    /// Persist the session if it changed and return the cookies to set.
    ///
    /// An untouched session produces no store write and no cookie.
    pub async fn commit(&self, session: &mut Session) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();

        if session.is_destroyed() {
            let mut store = self.store.lock().await;
            if let Some(previous) = session.take_previous_id() {
                store.destroy(&previous).await?;
            }
            if !session.is_new() {
                store.destroy(session.id()).await?;
            }
            header_set_cookie(
                &mut headers,
                &self.config.cookie_name,
                "",
                Some(0),
                self.config.secure,
            )?;
            session.mark_removed();
            tracing::debug!("Session destroyed");
            return Ok(headers);
        }

        if !session.is_modified() {
            return Ok(headers);
        }

        let record = SessionRecord {
            data: session.data().clone(),
            expires_at: Utc::now() + Duration::seconds(self.config.max_age as i64),
        };

        {
            let mut store = self.store.lock().await;
            if let Some(previous) = session.take_previous_id() {
                store.destroy(&previous).await?;
            }
            store.save(session.id(), record).await?;
        }

        let signed = sign_value(self.config.secret.as_bytes(), session.id())?;
        header_set_cookie(
            &mut headers,
            &self.config.cookie_name,
            &signed,
            Some(self.config.max_age as i64),
            self.config.secure,
        )?;
        session.mark_persisted();

        tracing::debug!("Session persisted");
        Ok(headers)
    }
}
