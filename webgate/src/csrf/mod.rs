//! Anti-forgery tokens
//!
//! Each client holds a random secret (in a cookie or in its session). Tokens
//! handed to pages are `salt.hmac(secret, salt)`, so every render gets a fresh
//! token while any of them verifies against the same secret.

use http::{HeaderMap, Method};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{CsrfConfig, CsrfStorage};
use crate::session::{Session, SessionError};
use crate::utils::{UtilError, gen_random_string, get_cookie, header_set_cookie, hmac_digest};

/// Session key holding the secret when `CsrfStorage::Session` is used.
pub const CSRF_SECRET_SESSION_KEY: &str = "csrfSecret";

/// Form and query field carrying a submitted token.
pub const CSRF_FIELD: &str = "_csrf";

/// Headers checked, in order, for a submitted token.
pub const CSRF_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

const SECRET_BYTES: usize = 18;
const SALT_BYTES: usize = 6;

#[derive(Debug, Error, Clone)]
pub enum CsrfError {
    #[error("invalid csrf token")]
    InvalidToken,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

/// Read-only methods never need a submitted token.
pub fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

pub fn create_secret() -> Result<String, CsrfError> {
    Ok(gen_random_string(SECRET_BYTES)?)
}

pub fn create_token(secret: &str) -> Result<String, CsrfError> {
    let salt = gen_random_string(SALT_BYTES)?;
    let digest = hmac_digest(secret.as_bytes(), salt.as_bytes())?;
    Ok(format!("{salt}.{digest}"))
}

pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((salt, _)) = token.split_once('.') else {
        return false;
    };
    let Ok(digest) = hmac_digest(secret.as_bytes(), salt.as_bytes()) else {
        return false;
    };
    let expected = format!("{salt}.{digest}");
    expected.as_bytes().ct_eq(token.as_bytes()).into()
}

/// First token found in the well-known CSRF headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    CSRF_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// The `_csrf` field of a query string or urlencoded form body.
pub fn token_from_urlencoded(input: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(input)
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// The top-level `_csrf` string of a JSON object body.
pub fn token_from_json(input: &[u8]) -> Option<String> {
    let body: serde_json::Value = serde_json::from_slice(input).ok()?;
    body.get(CSRF_FIELD)?.as_str().map(str::to_string)
}

/// Locates, creates, and checks per-client CSRF secrets.
#[derive(Clone, Debug)]
pub struct CsrfGuard {
    config: CsrfConfig,
    secure_cookie: bool,
}

impl CsrfGuard {
    pub fn new(config: CsrfConfig, secure_cookie: bool) -> Self {
        Self {
            config,
            secure_cookie,
        }
    }

    pub fn storage(&self) -> CsrfStorage {
        self.config.storage
    }

    /// The secret this client already holds, if any.
    pub fn load_secret(
        &self,
        headers: &HeaderMap,
        session: &Session,
    ) -> Result<Option<String>, CsrfError> {
        match self.config.storage {
            CsrfStorage::Cookie => Ok(get_cookie(headers, &self.config.cookie_name)),
            CsrfStorage::Session => Ok(session.get::<String>(CSRF_SECRET_SESSION_KEY)?),
        }
    }

    /// Create and attach a new secret. Returns the secret and any cookies to set.
    pub fn create_and_attach_secret(
        &self,
        session: &mut Session,
    ) -> Result<(String, HeaderMap), CsrfError> {
        let secret = create_secret()?;
        let mut headers = HeaderMap::new();
        match self.config.storage {
            CsrfStorage::Cookie => {
                header_set_cookie(
                    &mut headers,
                    &self.config.cookie_name,
                    &secret,
                    None,
                    self.secure_cookie,
                )?;
            }
            CsrfStorage::Session => {
                session.insert(CSRF_SECRET_SESSION_KEY, &secret)?;
            }
        }
        Ok((secret, headers))
    }

    /// Check a submitted token against the client's secret.
    pub fn validate(&self, secret: Option<&str>, submitted: Option<&str>) -> Result<(), CsrfError> {
        match (secret, submitted) {
            (Some(secret), Some(token)) if verify_token(secret, token) => Ok(()),
            (None, _) => {
                tracing::warn!("CSRF secret missing for state-changing request");
                Err(CsrfError::InvalidToken)
            }
            (_, None) => {
                tracing::warn!("CSRF token missing for state-changing request");
                Err(CsrfError::InvalidToken)
            }
            _ => {
                tracing::warn!("CSRF token mismatch");
                Err(CsrfError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{COOKIE, SET_COOKIE};

    fn guard(storage: CsrfStorage) -> CsrfGuard {
        CsrfGuard::new(
            CsrfConfig {
                storage,
                cookie_name: "_csrf".to_string(),
            },
            false,
        )
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PUT));
        assert!(!is_safe_method(&Method::PATCH));
        assert!(!is_safe_method(&Method::DELETE));
    }

    #[test]
    fn test_tokens_are_salted_and_verify() {
        let secret = create_secret().unwrap();
        let a = create_token(&secret).unwrap();
        let b = create_token(&secret).unwrap();

        assert_ne!(a, b);
        assert!(verify_token(&secret, &a));
        assert!(verify_token(&secret, &b));
    }

    #[test]
    fn test_token_does_not_verify_under_other_secret() {
        let token = create_token(&create_secret().unwrap()).unwrap();
        let other = create_secret().unwrap();

        assert!(!verify_token(&other, &token));
        assert!(!verify_token(&other, "garbage"));
        assert!(!verify_token(&other, ""));
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert("x-csrf-token", "abc".parse().unwrap());
        assert_eq!(token_from_headers(&headers), Some("abc".to_string()));

        // csrf-token is checked first
        headers.insert("csrf-token", "first".parse().unwrap());
        assert_eq!(token_from_headers(&headers), Some("first".to_string()));
    }

    #[test]
    fn test_token_from_urlencoded() {
        assert_eq!(
            token_from_urlencoded(b"username=ada&_csrf=a.b%2Bc"),
            Some("a.b+c".to_string())
        );
        assert_eq!(token_from_urlencoded(b"username=ada"), None);
        assert_eq!(token_from_urlencoded(b""), None);
    }

    #[test]
    fn test_token_from_json() {
        assert_eq!(
            token_from_json(br#"{"_csrf": "a.b", "name": "thing"}"#),
            Some("a.b".to_string())
        );
        assert_eq!(token_from_json(br#"{"name": "thing"}"#), None);
        assert_eq!(token_from_json(br#"{"_csrf": 42}"#), None);
        assert_eq!(token_from_json(br#"{"nested": {"_csrf": "a.b"}}"#), None);
        assert_eq!(token_from_json(br#"["_csrf"]"#), None);
        assert_eq!(token_from_json(b"not json"), None);
    }

    #[test]
    fn test_validate() {
        let guard = guard(CsrfStorage::Cookie);
        let secret = create_secret().unwrap();
        let token = create_token(&secret).unwrap();

        assert!(guard.validate(Some(&secret), Some(&token)).is_ok());
        assert!(matches!(
            guard.validate(Some(&secret), None),
            Err(CsrfError::InvalidToken)
        ));
        assert!(matches!(
            guard.validate(None, Some(&token)),
            Err(CsrfError::InvalidToken)
        ));
        assert!(matches!(
            guard.validate(Some(&secret), Some("x.y")),
            Err(CsrfError::InvalidToken)
        ));
    }

    #[test]
    fn test_cookie_storage_leaves_session_untouched() {
        // Given cookie-based secret storage and a fresh session
        let guard = guard(CsrfStorage::Cookie);
        let mut session = Session::new().unwrap();

        // When a secret is created
        let (secret, headers) = guard.create_and_attach_secret(&mut session).unwrap();

        // Then it travels in a cookie and the session stays clean
        let set_cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("_csrf={secret};")));
        assert!(!session.is_modified());

        // And the next request finds it again
        let mut request = HeaderMap::new();
        request.insert(COOKIE, format!("_csrf={secret}").parse().unwrap());
        assert_eq!(guard.load_secret(&request, &session).unwrap(), Some(secret));
    }

    #[test]
    fn test_session_storage_writes_secret_into_session() {
        let guard = guard(CsrfStorage::Session);
        let mut session = Session::new().unwrap();

        let (secret, headers) = guard.create_and_attach_secret(&mut session).unwrap();

        assert!(headers.is_empty());
        assert!(session.is_modified());
        assert_eq!(
            guard.load_secret(&HeaderMap::new(), &session).unwrap(),
            Some(secret)
        );
    }
}
