//! The error terminator: the single place failures become error pages.

use std::any::Any;

use askama::Template;
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{
    HeaderValue, Method, Uri,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    response::Parts,
};

use webgate::RuntimeMode;

use crate::error::AppError;

/// Most of a plain-text error body kept as the development detail.
const MAX_DETAIL_BYTES: usize = 4096;

#[derive(Template)]
#[template(path = "error.j2")]
struct ErrorTemplate<'a> {
    status: u16,
    message: &'a str,
    error: Option<&'a str>,
}

/// An error status produced outside our handlers, such as an extractor
/// rejection. A plain-text body becomes the detail.
async fn unhandled_error(parts: &Parts, body: Body) -> AppError {
    let err = AppError::new(
        parts.status,
        parts.status.canonical_reason().unwrap_or("Error"),
    );

    let is_text = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));
    if !is_text {
        return err;
    }

    match to_bytes(body, MAX_DETAIL_BYTES).await {
        Ok(bytes) => match String::from_utf8_lossy(&bytes).trim() {
            "" => err,
            text => err.with_detail(text),
        },
        Err(_) => err,
    }
}

/// Outermost layer. Replaces the body of any response carrying an
/// [`AppError`], or any bare 4xx/5xx, with the rendered error page, keeping
/// its other headers (a session cookie set on the way out, for instance).
pub(crate) async fn error_terminator(
    State(mode): State<RuntimeMode>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = next.run(req).await.into_parts();
    let err = match parts.extensions.remove::<AppError>() {
        Some(err) => err,
        None if parts.status.is_client_error() || parts.status.is_server_error() => {
            unhandled_error(&parts, body).await
        }
        None => return Response::from_parts(parts, body),
    };

    if err.status().is_server_error() {
        tracing::error!("Request failed: {err}");
    } else {
        tracing::debug!("Request failed: {err}");
    }

    parts.status = err.status();
    parts.headers.remove(CONTENT_LENGTH);

    let template = ErrorTemplate {
        status: err.status().as_u16(),
        message: err.message(),
        error: err.detail().filter(|_| mode.is_development()),
    };
    let body = match template.render() {
        Ok(html) => {
            parts.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            Body::from(html)
        }
        Err(e) => {
            tracing::error!("Failed to render error page: {e}");
            parts.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            Body::from(err.message().to_string())
        }
    };
    Response::from_parts(parts, body)
}

/// Final route when neither a route nor a static file matched.
pub(crate) async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::not_found().with_detail(format!("No route for {method} {}", uri.path()))
}

/// Turns a handler panic into a 500 for the terminator to render.
pub(crate) fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::internal(detail).into_response()
}
