//! Application configuration
//!
//! All settings are read once at process start into an immutable [`AppConfig`]
//! which is then passed by reference into pipeline assembly. Values without a
//! safe default (the session secret and the listening port) must be provided.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "connect.sid";
pub const DEFAULT_SESSION_COOKIE_MAX_AGE: u64 = 86400;
pub const DEFAULT_CSRF_COOKIE_NAME: &str = "_csrf";
pub const DEFAULT_SESSION_STORE_DIR: &str = "database";
pub const DEFAULT_SESSION_STORE_DB: &str = "sessions.db";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_PROVIDER_A_PREFIX: &str = "/google";
pub const DEFAULT_PROVIDER_B_PREFIX: &str = "/facebook";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Development mode exposes diagnostic detail in error responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(RuntimeMode::Development),
            "production" | "prod" => Ok(RuntimeMode::Production),
            other => Err(format!("expected 'development' or 'production', got '{other}'")),
        }
    }
}

/// Where the CSRF secret lives between requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfStorage {
    /// Separate HTTP-only cookie; issuing tokens never touches the session.
    Cookie,
    /// Inside the session record.
    Session,
}

impl FromStr for CsrfStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cookie" => Ok(CsrfStorage::Cookie),
            "session" => Ok(CsrfStorage::Session),
            other => Err(format!("expected 'cookie' or 'session', got '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStoreKind {
    Sqlite { dir: PathBuf, db: String },
    Memory,
}

impl SessionStoreKind {
    /// Full path of the SQLite database file, if any.
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        match self {
            SessionStoreKind::Sqlite { dir, db } => Some(dir.join(db)),
            SessionStoreKind::Memory => None,
        }
    }
}

/// Key used to sign session cookies. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(**redacted**)")
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secret: SessionSecret,
    /// Seconds until a persisted session expires.
    pub max_age: u64,
    pub secure: bool,
}

#[derive(Clone, Debug)]
pub struct CsrfConfig {
    pub storage: CsrfStorage,
    pub cookie_name: String,
}

/// Mount points of the two identity-provider route groups.
#[derive(Clone, Debug)]
pub struct RoutePrefixes {
    pub provider_a: String,
    pub provider_b: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_port: u16,
    pub runtime_mode: RuntimeMode,
    pub session: SessionConfig,
    pub csrf: CsrfConfig,
    pub store: SessionStoreKind,
    pub static_dir: PathBuf,
    pub routes: RoutePrefixes,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SESSION_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SESSION_SECRET"))?;

        let listen_port = lookup("LISTEN_PORT").ok_or(ConfigError::Missing("LISTEN_PORT"))?;
        let listen_port = parse_value::<u16>("LISTEN_PORT", &listen_port)?;

        let runtime_mode = match lookup("APP_ENV") {
            Some(v) => parse_value("APP_ENV", &v)?,
            None => RuntimeMode::Production,
        };

        let max_age = match lookup("SESSION_COOKIE_MAX_AGE") {
            Some(v) => parse_value("SESSION_COOKIE_MAX_AGE", &v)?,
            None => DEFAULT_SESSION_COOKIE_MAX_AGE,
        };

        let secure = lookup("SESSION_COOKIE_SECURE")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let csrf_storage = match lookup("CSRF_STORAGE") {
            Some(v) => parse_value("CSRF_STORAGE", &v)?,
            None => CsrfStorage::Cookie,
        };

        let store = match lookup("SESSION_STORE_TYPE").as_deref() {
            None | Some("sqlite") => SessionStoreKind::Sqlite {
                dir: PathBuf::from(
                    lookup("SESSION_STORE_DIR")
                        .unwrap_or_else(|| DEFAULT_SESSION_STORE_DIR.to_string()),
                ),
                db: lookup("SESSION_STORE_DB")
                    .unwrap_or_else(|| DEFAULT_SESSION_STORE_DB.to_string()),
            },
            Some("memory") => SessionStoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SESSION_STORE_TYPE",
                    reason: format!("unsupported store type '{other}'"),
                });
            }
        };

        let provider_a = lookup("PROVIDER_A_PREFIX")
            .unwrap_or_else(|| DEFAULT_PROVIDER_A_PREFIX.to_string());
        let provider_b = lookup("PROVIDER_B_PREFIX")
            .unwrap_or_else(|| DEFAULT_PROVIDER_B_PREFIX.to_string());

        Ok(Self {
            listen_port,
            runtime_mode,
            session: SessionConfig {
                cookie_name: lookup("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
                secret: SessionSecret::new(secret),
                max_age,
                secure,
            },
            csrf: CsrfConfig {
                storage: csrf_storage,
                cookie_name: lookup("CSRF_COOKIE_NAME")
                    .unwrap_or_else(|| DEFAULT_CSRF_COOKIE_NAME.to_string()),
            },
            store,
            static_dir: PathBuf::from(
                lookup("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            ),
            routes: RoutePrefixes {
                provider_a,
                provider_b,
            },
        })
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

// Anything other than "false"/"0" is treated as enabled
fn parse_flag(value: &str) -> bool {
    !matches!(value.to_lowercase().as_str(), "false" | "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("SESSION_SECRET", "s3cret"), ("LISTEN_PORT", "8080")];

    #[test]
    fn test_defaults_with_required_settings() {
        let config = AppConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.runtime_mode, RuntimeMode::Production);
        assert_eq!(config.session.cookie_name, DEFAULT_SESSION_COOKIE_NAME);
        assert_eq!(config.session.secret.as_bytes(), b"s3cret");
        assert_eq!(config.session.max_age, DEFAULT_SESSION_COOKIE_MAX_AGE);
        assert!(!config.session.secure);
        assert_eq!(config.csrf.storage, CsrfStorage::Cookie);
        assert_eq!(config.csrf.cookie_name, DEFAULT_CSRF_COOKIE_NAME);
        assert_eq!(
            config.store.sqlite_path(),
            Some(PathBuf::from("database").join("sessions.db"))
        );
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.routes.provider_a, "/google");
        assert_eq!(config.routes.provider_b, "/facebook");
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("LISTEN_PORT", "8080")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("SESSION_SECRET"));

        let result =
            AppConfig::from_lookup(lookup_from(&[("LISTEN_PORT", "8080"), ("SESSION_SECRET", "")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("SESSION_SECRET"));
    }

    #[test]
    fn test_missing_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("SESSION_SECRET", "x")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("LISTEN_PORT"));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result =
            AppConfig::from_lookup(lookup_from(&[("SESSION_SECRET", "x"), ("LISTEN_PORT", "http")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "LISTEN_PORT",
                ..
            })
        ));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("APP_ENV", "development"),
            ("SESSION_COOKIE_NAME", "sid"),
            ("SESSION_COOKIE_MAX_AGE", "60"),
            ("SESSION_COOKIE_SECURE", "true"),
            ("CSRF_STORAGE", "session"),
            ("SESSION_STORE_TYPE", "memory"),
            ("PROVIDER_A_PREFIX", "/github"),
        ]);
        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert!(config.runtime_mode.is_development());
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.max_age, 60);
        assert!(config.session.secure);
        assert_eq!(config.csrf.storage, CsrfStorage::Session);
        assert_eq!(config.store, SessionStoreKind::Memory);
        assert_eq!(config.store.sqlite_path(), None);
        assert_eq!(config.routes.provider_a, "/github");
        assert_eq!(config.routes.provider_b, "/facebook");
    }

    #[test]
    fn test_unsupported_store_type() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SESSION_STORE_TYPE", "redis"));
        let result = AppConfig::from_lookup(lookup_from(&pairs));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "SESSION_STORE_TYPE",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_runtime_mode() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("APP_ENV", "staging"));
        assert!(AppConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("FALSE"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_secret_is_redacted_in_debug_output() {
        let secret = SessionSecret::new("keyboard cat");
        assert_eq!(format!("{secret:?}"), "SessionSecret(**redacted**)");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // Given the required variables in the process environment
        let saved: Vec<_> = ["SESSION_SECRET", "LISTEN_PORT", "APP_ENV"]
            .iter()
            .map(|k| (*k, env::var(k).ok()))
            .collect();
        unsafe {
            env::set_var("SESSION_SECRET", "from-env");
            env::set_var("LISTEN_PORT", "9090");
            env::remove_var("APP_ENV");
        }

        // When reading the configuration
        let config = AppConfig::from_env();

        // Restore before asserting so a failure leaves the environment clean
        for (key, value) in saved {
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }

        // Then the values are picked up
        let config = config.unwrap();
        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.session.secret.as_bytes(), b"from-env");
        assert_eq!(config.runtime_mode, RuntimeMode::Production);
    }
}
