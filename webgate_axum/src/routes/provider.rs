use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use http::StatusCode;
use serde::Deserialize;

use webgate::{IdentityProvider, VerifierError, gen_random_string};

use super::push_message;
use crate::error::AppError;
use crate::extract::{AuthSession, SessionHandle};

const STATE_BYTES: usize = 16;

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn state_key(provider: &dyn IdentityProvider) -> String {
    format!("authState:{}", provider.name())
}

/// `GET /login` and `GET /callback` for one identity provider.
pub fn provider_router(provider: Arc<dyn IdentityProvider>) -> Router {
    Router::new()
        .route("/login", get(start))
        .route("/callback", get(callback))
        .with_state(provider)
}

async fn start(
    State(provider): State<Arc<dyn IdentityProvider>>,
    session: SessionHandle,
) -> Result<Redirect, AppError> {
    let state = gen_random_string(STATE_BYTES)?;
    session
        .lock()
        .await
        .insert(&state_key(provider.as_ref()), &state)?;

    let url = provider.authorization_url(&state)?;
    tracing::debug!("Redirecting to {} for authentication", provider.name());
    Ok(Redirect::to(&url))
}

async fn callback(
    State(provider): State<Arc<dyn IdentityProvider>>,
    mut auth: AuthSession,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let expected = auth
        .session()
        .lock()
        .await
        .remove(&state_key(provider.as_ref()));

    if let Some(error) = query.error {
        tracing::info!("{} denied authentication: {error}", provider.name());
        push_message(
            &mut *auth.session().lock().await,
            &format!("Sign in with {} was cancelled.", provider.name()),
        )?;
        return Ok(Redirect::to("/login"));
    }

    let state_matches = match (expected.as_ref().and_then(|v| v.as_str()), &query.state) {
        (Some(expected), Some(received)) => expected == received.as_str(),
        _ => false,
    };
    if !state_matches {
        tracing::warn!("Authorization state mismatch for {}", provider.name());
        return Err(VerifierError::InvalidState.into());
    }

    let code = query
        .code
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "Bad Request"))?;
    let user = provider.exchange(&code).await?;
    auth.login(user).await?;
    Ok(Redirect::to("/"))
}
