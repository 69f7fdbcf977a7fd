use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE};
use tower::ServiceExt;

use webgate::{
    create_token, is_safe_method, token_from_headers, token_from_json, token_from_urlencoded,
};

use crate::error::AppError;
use crate::extract::{AuthSession, CsrfToken, CurrentUser, SessionHandle};
use crate::pipeline::PipelineState;

/// Upper bound on bodies buffered while looking for a `_csrf` field.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

fn append_headers(response: &mut Response, headers: HeaderMap) {
    headers.iter().for_each(|(name, value)| {
        response.headers_mut().append(name, value.clone());
    });
}

/// Session stage: restore before the handler, commit after it.
pub(crate) async fn session_stage(
    State(state): State<PipelineState>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = match state.sessions.restore(req.headers()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to restore session: {e}");
            return AppError::from(e).into_response();
        }
    };

    let handle = SessionHandle::new(session);
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    let committed = {
        let mut session = handle.lock().await;
        state.sessions.commit(&mut session).await
    };

    match committed {
        Ok(cookies) => {
            append_headers(&mut response, cookies);
            response
        }
        Err(e) if response.extensions().get::<AppError>().is_some() => {
            // The response already carries a failure; keep that one.
            tracing::error!("Failed to save session after an earlier error: {e}");
            response
        }
        Err(e) => {
            tracing::error!("Failed to save session: {e}");
            AppError::from(e).into_response()
        }
    }
}

/// Serves files from the static directory, after the session is restored
/// and before CSRF. Anything the directory does not hold continues down
/// the pipeline.
pub(crate) async fn static_files_stage(
    State(state): State<PipelineState>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let mut lookup = Request::new(Body::empty());
    *lookup.method_mut() = req.method().clone();
    *lookup.uri_mut() = req.uri().clone();
    *lookup.headers_mut() = req.headers().clone();

    match state.static_files.clone().oneshot(lookup).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => response.map(Body::new),
        _ => next.run(req).await,
    }
}

/// Token submitted with a state-changing request: headers, then the query
/// string, then a urlencoded form or JSON body. The body is buffered and
/// put back.
async fn submitted_token(req: Request) -> Result<(Request, Option<String>), AppError> {
    if let Some(token) = token_from_headers(req.headers()) {
        return Ok((req, Some(token)));
    }

    if let Some(token) = req
        .uri()
        .query()
        .and_then(|query| token_from_urlencoded(query.as_bytes()))
    {
        return Ok((req, Some(token)));
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let parse: fn(&[u8]) -> Option<String> = if content_type.starts_with(FORM_CONTENT_TYPE) {
        token_from_urlencoded
    } else if content_type.starts_with(JSON_CONTENT_TYPE) {
        token_from_json
    } else {
        return Ok((req, None));
    };

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").with_detail(e.to_string())
    })?;
    let token = parse(&bytes);
    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

/// Checks the token on unsafe methods and hands a fresh one to the handler.
async fn csrf_check(state: &PipelineState, req: Request) -> Result<(Request, HeaderMap), AppError> {
    let handle = req
        .extensions()
        .get::<SessionHandle>()
        .cloned()
        .ok_or_else(|| AppError::internal("CSRF stage requires a restored session"))?;

    let (mut req, submitted) = if is_safe_method(req.method()) {
        (req, None)
    } else {
        submitted_token(req).await?
    };

    let mut session = handle.lock().await;
    let secret = state.csrf.load_secret(req.headers(), &session)?;

    if !is_safe_method(req.method()) {
        state
            .csrf
            .validate(secret.as_deref(), submitted.as_deref())?;
    }

    let (secret, cookies) = match secret {
        Some(secret) => (secret, HeaderMap::new()),
        None => state.csrf.create_and_attach_secret(&mut session)?,
    };
    drop(session);

    req.extensions_mut().insert(CsrfToken(create_token(&secret)?));
    Ok((req, cookies))
}

pub(crate) async fn csrf_stage(
    State(state): State<PipelineState>,
    req: Request,
    next: Next,
) -> Response {
    match csrf_check(&state, req).await {
        Ok((req, cookies)) => {
            let mut response = next.run(req).await;
            append_headers(&mut response, cookies);
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Auth stage: restores the current user from the session.
pub(crate) async fn auth_stage(
    State(state): State<PipelineState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(handle) = req.extensions().get::<SessionHandle>().cloned() else {
        return AppError::internal("Auth stage requires a restored session").into_response();
    };
    if req.extensions().get::<CsrfToken>().is_none() {
        return AppError::internal("Auth stage must run after CSRF protection").into_response();
    }

    let user = {
        let session = handle.lock().await;
        state.auth.current_user(&session).await
    };
    let user = match user {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to restore authenticated user: {e}");
            return AppError::from(e).into_response();
        }
    };

    req.extensions_mut().insert(CurrentUser(user.clone()));
    req.extensions_mut()
        .insert(AuthSession::new(handle, state.auth.clone(), user));
    next.run(req).await
}
