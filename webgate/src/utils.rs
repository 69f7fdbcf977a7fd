use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use headers::HeaderMapExt;
use hmac::{Hmac, Mac};
use http::header::{HeaderMap, SET_COOKIE};
use ring::rand::SecureRandom;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn base64url_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|_| UtilError::Format("Failed to decode base64url".to_string()))
}

pub fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| UtilError::Crypto("Failed to generate random string".to_string()))?;
    Ok(base64url_encode(&buf))
}

/// HMAC-SHA256 of `message` under `key`, base64url encoded.
pub(crate) fn hmac_digest(key: &[u8], message: &[u8]) -> Result<String, UtilError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| UtilError::Crypto("Invalid HMAC key".to_string()))?;
    mac.update(message);
    Ok(base64url_encode(&mac.finalize().into_bytes()))
}

/// Appends `.{signature}` to a cookie value.
pub(crate) fn sign_value(secret: &[u8], value: &str) -> Result<String, UtilError> {
    let signature = hmac_digest(secret, value.as_bytes())?;
    Ok(format!("{value}.{signature}"))
}

/// Returns the original value when the signature verifies, `None` otherwise.
pub(crate) fn unsign_value<'a>(secret: &[u8], signed: &'a str) -> Option<&'a str> {
    let (value, signature) = signed.rsplit_once('.')?;
    let signature = base64url_decode(signature).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(value)
}

/// Reads a single cookie from the request headers.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .typed_get::<headers::Cookie>()
        .and_then(|cookies| cookies.get(name).map(str::to_string))
}

pub(crate) fn header_set_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    max_age: Option<i64>,
    secure: bool,
) -> Result<(), UtilError> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| UtilError::Cookie("Failed to parse cookie".to_string()))?,
    );
    Ok(())
}

#[derive(Debug, Error, Clone)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::COOKIE;
    use proptest::prelude::*;

    #[test]
    fn test_gen_random_string_is_unique() {
        let a = gen_random_string(32).unwrap();
        let b = gen_random_string(32).unwrap();

        // 32 bytes encode to 43 base64url characters without padding
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sign_and_unsign() {
        let secret = b"test-secret";
        let signed = sign_value(secret, "abc123").unwrap();

        assert!(signed.starts_with("abc123."));
        assert_eq!(unsign_value(secret, &signed), Some("abc123"));
    }

    #[test]
    fn test_unsign_rejects_tampered_value() {
        let secret = b"test-secret";
        let signed = sign_value(secret, "abc123").unwrap();
        let tampered = signed.replacen("abc123", "abc124", 1);

        assert_eq!(unsign_value(secret, &tampered), None);
    }

    #[test]
    fn test_unsign_rejects_malformed_input() {
        assert_eq!(unsign_value(b"s", "no-signature-here"), None);
        assert_eq!(unsign_value(b"s", "value.!!not-base64!!"), None);
        assert_eq!(unsign_value(b"s", ""), None);
    }

    #[test]
    fn test_get_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "a=1; connect.sid=xyz; b=2".parse().unwrap());

        assert_eq!(get_cookie(&headers, "connect.sid"), Some("xyz".to_string()));
        assert_eq!(get_cookie(&headers, "missing"), None);
        assert_eq!(get_cookie(&HeaderMap::new(), "connect.sid"), None);
    }

    #[test]
    fn test_header_set_cookie_attributes() {
        let mut headers = HeaderMap::new();
        header_set_cookie(&mut headers, "sid", "v", Some(600), false).unwrap();
        header_set_cookie(&mut headers, "other", "w", None, true).unwrap();

        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 2);
        assert_eq!(
            values[0],
            "sid=v; Path=/; HttpOnly; SameSite=Lax; Max-Age=600"
        );
        assert_eq!(values[1], "other=w; Path=/; HttpOnly; SameSite=Lax; Secure");
    }

    #[test]
    fn test_header_set_cookie_rejects_invalid_value() {
        let mut headers = HeaderMap::new();

        let result = header_set_cookie(&mut headers, "sid", "bad\nvalue", None, false);

        assert!(matches!(result, Err(UtilError::Cookie(_))));
        assert!(headers.is_empty());
    }

    proptest! {
        #[test]
        fn signature_does_not_verify_under_other_secret(
            value in "[A-Za-z0-9_-]{1,64}",
            // Equal lengths: HMAC zero-pads short keys, so [1] and [1, 0] would collide
            a in proptest::collection::vec(any::<u8>(), 32),
            b in proptest::collection::vec(any::<u8>(), 32),
        ) {
            prop_assume!(a != b);
            let signed = sign_value(&a, &value).unwrap();
            prop_assert_eq!(unsign_value(&a, &signed), Some(value.as_str()));
            prop_assert!(unsign_value(&b, &signed).is_none());
        }
    }
}
