mod errors;
mod serializer;
mod types;

pub use errors::{IdentityError, VerifierError};
pub use serializer::{AUTH_SESSION_KEY, AuthStateManager, PassThroughSerializer};
pub use types::{CredentialVerifier, IdentityProvider, UserIdentity, UserSerializer};
