use std::sync::Arc;

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use webgate::CredentialVerifier;

use super::{push_message, take_messages};
use crate::error::AppError;
use crate::extract::{AuthSession, CsrfToken};

const LOGIN_FAILED: &str = "Incorrect username or password.";

/// A "sign in with" link shown on the login page.
#[derive(Clone, Debug)]
pub struct ProviderLink {
    pub label: String,
    pub href: String,
}

impl ProviderLink {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
        }
    }
}

#[derive(Clone)]
struct LocalAuthState {
    verifier: Arc<dyn CredentialVerifier>,
    providers: Arc<Vec<ProviderLink>>,
}

#[derive(Template)]
#[template(path = "login.j2")]
struct LoginTemplate<'a> {
    csrf_token: &'a str,
    messages: Vec<String>,
    providers: &'a [ProviderLink],
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

/// `GET /login`, `POST /login/password` and `POST /logout`.
pub fn local_auth_router(
    verifier: Arc<dyn CredentialVerifier>,
    providers: Vec<ProviderLink>,
) -> Router {
    Router::new()
        .route("/login", get(login_page))
        .route("/login/password", post(login_password))
        .route("/logout", post(logout))
        .with_state(LocalAuthState {
            verifier,
            providers: Arc::new(providers),
        })
}

async fn login_page(
    State(state): State<LocalAuthState>,
    auth: AuthSession,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<Response, AppError> {
    if auth.user().is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let messages = take_messages(&mut *auth.session().lock().await)?;
    let template = LoginTemplate {
        csrf_token: &csrf_token,
        messages,
        providers: &state.providers,
    };
    let html = template
        .render()
        .map_err(|e| AppError::internal(e.to_string()))?;
    Ok(Html(html).into_response())
}

async fn login_password(
    State(state): State<LocalAuthState>,
    mut auth: AuthSession,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    match state.verifier.verify(&form.username, &form.password).await? {
        Some(user) => {
            auth.login(user).await?;
            Ok(Redirect::to("/"))
        }
        None => {
            tracing::debug!("Rejected password login for {}", form.username);
            push_message(&mut *auth.session().lock().await, LOGIN_FAILED)?;
            Ok(Redirect::to("/login"))
        }
    }
}

async fn logout(mut auth: AuthSession) -> Result<Redirect, AppError> {
    auth.logout().await?;
    Ok(Redirect::to("/"))
}
