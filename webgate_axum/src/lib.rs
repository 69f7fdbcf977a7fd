//! Axum integration for webgate.
//!
//! [`assemble`] wraps the application's route groups in a fixed chain of
//! stages (request log, session, CSRF, auth) inside an error terminator that
//! renders every failure as a single error page.

mod error;
mod extract;
mod middleware;
mod pipeline;
mod router;
mod routes;
mod terminator;

pub use error::AppError;
pub use extract::{
    AuthRedirect, AuthSession, AuthUser, CsrfToken, CurrentUser, LOGIN_PATH, SessionHandle,
};
pub use pipeline::{Collaborators, Pipeline, PipelineError, Stage, assemble, assemble_with};
pub use router::{RouteGroup, RouteGroups};
pub use routes::{MESSAGES_SESSION_KEY, ProviderLink, local_auth_router, provider_router};

// Re-export the core crate for applications that only depend on this one
pub use webgate;
