use std::fmt;

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use webgate::{CsrfError, IdentityError, SessionError, UtilError, VerifierError};

/// A failure that should reach the client as a rendered error page.
///
/// Converting an `AppError` into a response only records it in the response
/// extensions. The error terminator, the outermost layer, turns it into the
/// page, so every failure is rendered in exactly one place.
#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// Diagnostic text shown only in development mode.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").with_detail(detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<CsrfError> for AppError {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::InvalidToken => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<VerifierError> for AppError {
    fn from(err: VerifierError) -> Self {
        let status = match err {
            VerifierError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            VerifierError::Provider(_) => StatusCode::BAD_GATEWAY,
            VerifierError::InvalidState => StatusCode::FORBIDDEN,
        };
        let message = status.canonical_reason().unwrap_or("Error");
        Self::new(status, message).with_detail(err.to_string())
    }
}

impl From<UtilError> for AppError {
    fn from(err: UtilError) -> Self {
        Self::internal(err.to_string())
    }
}
