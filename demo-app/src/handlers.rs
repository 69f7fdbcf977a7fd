use askama::Template;
use axum::{Router, response::Html, routing::get};

use webgate_axum::{AppError, AuthUser, CsrfToken};

#[derive(Template)]
#[template(path = "index.j2")]
struct IndexTemplate<'a> {
    user: Option<&'a AuthUser>,
    csrf_token: &'a str,
}

#[derive(Template)]
#[template(path = "account.j2")]
struct AccountTemplate<'a> {
    user: &'a AuthUser,
    csrf_token: &'a str,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/account", get(account))
}

async fn index(
    user: Option<AuthUser>,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<Html<String>, AppError> {
    let template = IndexTemplate {
        user: user.as_ref(),
        csrf_token: &csrf_token,
    };
    let html = template
        .render()
        .map_err(|e| AppError::internal(e.to_string()))?;
    Ok(Html(html))
}

async fn account(
    user: AuthUser,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<Html<String>, AppError> {
    tracing::trace!("Account page for {}", user.id);
    let template = AccountTemplate {
        user: &user,
        csrf_token: &csrf_token,
    };
    let html = template
        .render()
        .map_err(|e| AppError::internal(e.to_string()))?;
    Ok(Html(html))
}
