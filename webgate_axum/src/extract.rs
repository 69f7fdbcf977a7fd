use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    response::{IntoResponse, Redirect, Response},
};
use http::{Method, StatusCode, request::Parts};
use tokio::sync::{Mutex, MutexGuard};

use webgate::{AuthStateManager, Session, UserIdentity};

use crate::error::AppError;

/// Path anonymous GET requests are sent to by [`AuthUser`].
pub const LOGIN_PATH: &str = "/login";

/// The request's session, shared between the session stage and handlers.
///
/// The session stage commits whatever state the session is in once the
/// handler's response comes back.
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub(crate) fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| AppError::internal("Session stage is not installed"))
    }
}

/// A fresh anti-forgery token for the page being rendered.
#[derive(Clone, Debug)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AppError::internal("CSRF stage is not installed"))
    }
}

/// The user restored by the auth stage, or `None` for anonymous requests.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Option<UserIdentity>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::internal("Auth stage is not installed"))
    }
}

/// Login and logout for handlers.
#[derive(Clone)]
pub struct AuthSession {
    session: SessionHandle,
    auth: AuthStateManager,
    user: Option<UserIdentity>,
}

impl AuthSession {
    pub(crate) fn new(
        session: SessionHandle,
        auth: AuthStateManager,
        user: Option<UserIdentity>,
    ) -> Self {
        Self {
            session,
            auth,
            user,
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Record `user` as authenticated; the session id changes.
    pub async fn login(&mut self, user: UserIdentity) -> Result<(), AppError> {
        let mut session = self.session.lock().await;
        self.auth.login(&mut session, &user).await?;
        self.user = Some(user);
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), AppError> {
        let mut session = self.session.lock().await;
        self.auth.logout(&mut session)?;
        self.user = None;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .ok_or_else(|| AppError::internal("Auth stage is not installed"))
    }
}

pub struct AuthRedirect {
    method: Method,
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        if self.method == Method::GET {
            tracing::debug!("Redirecting anonymous request to {LOGIN_PATH}");
            Redirect::to(LOGIN_PATH).into_response()
        } else {
            AppError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// An authenticated user, required by the handler.
///
/// Anonymous GET requests are redirected to the login page, anything else
/// gets a 401. Use `Option<AuthUser>` where anonymous access is fine.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
}

impl From<UserIdentity> for AuthUser {
    fn from(user: UserIdentity) -> Self {
        Self {
            id: user.id,
            name: user.name,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser(Some(user))) => Ok(AuthUser::from(user.clone())),
            _ => Err(AuthRedirect {
                method: parts.method.clone(),
            }),
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|current| current.0.clone())
            .map(AuthUser::from))
    }
}
