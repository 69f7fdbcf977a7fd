//! webgate - building blocks for a session-backed web request pipeline
//!
//! This crate holds the framework-agnostic parts: configuration, sessions and
//! their stores, CSRF tokens, and the authenticated-user state kept in the
//! session. The collaborators that actually check credentials are traits.

mod config;
mod csrf;
mod identity;
mod session;
mod storage;
mod utils;

pub use config::{
    AppConfig, ConfigError, CsrfConfig, CsrfStorage, RoutePrefixes, RuntimeMode, SessionConfig,
    SessionSecret, SessionStoreKind,
};

pub use csrf::{
    CSRF_FIELD, CSRF_HEADERS, CSRF_SECRET_SESSION_KEY, CsrfError, CsrfGuard, create_token,
    is_safe_method, token_from_headers, token_from_json, token_from_urlencoded, verify_token,
};

pub use identity::{
    AUTH_SESSION_KEY, AuthStateManager, CredentialVerifier, IdentityError, IdentityProvider,
    PassThroughSerializer, UserIdentity, UserSerializer, VerifierError,
};

pub use session::{Session, SessionError, SessionManager};

pub use storage::{
    InMemorySessionStore, SessionRecord, SessionStore, SharedSessionStore, SqliteSessionStore,
    StorageError, build_session_store, shared_store,
};

pub use utils::{UtilError, gen_random_string, get_cookie};
