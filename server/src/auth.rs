//! Session tokens and cookies.
//!
//! The identity provider signs HS256 tokens with a shared secret. The server
//! verifies the signature and expiry, then derives one session context per
//! request from the `session_token` cookie (or a bearer header) instead of
//! each view re-subscribing to provider state.
//!
//! Token layout is standard JWT: `base64url(header).base64url(claims).sig`,
//! unpadded, HMAC-SHA-256 over the first two segments.

use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";
pub const SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Identity claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
}

impl Claims {
    pub fn display_name(&self, fallback: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts any key length.
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key")
}

pub fn mint_token(secret: &str, claims: &Claims) -> String {
    let header = TokenHeader {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header json")),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims json")),
    );

    let mut mac = mac(secret);
    mac.update(signing_input.as_bytes());

    format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    )
}

pub fn verify_token(secret: &str, token: &str, now_secs: i64) -> Result<Claims, AppError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AppError::Unauthorized);
    };

    let header: TokenHeader = URL_SAFE_NO_PAD
        .decode(header)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;
    if header.alg != "HS256" {
        return Err(AppError::Unauthorized);
    }

    let mut mac = mac(secret);
    mac.update(token[..token.len() - signature.len() - 1].as_bytes());

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AppError::Unauthorized)?;
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;

    if claims.exp <= now_secs {
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={SESSION_MAX_AGE_SECS}"
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Resolves the caller's identity from the session cookie or a bearer
/// header. Fails 503 when no identity-provider secret is configured and 401
/// for anything wrong with the token itself.
pub fn authenticate(
    secret: Option<&str>,
    headers: &HeaderMap,
    now_secs: i64,
) -> Result<Claims, AppError> {
    let secret = secret.ok_or(AppError::FeatureDisabled("Authentication"))?;

    let token = cookie_value(headers, SESSION_COOKIE)
        .or_else(|| bearer_token(headers))
        .ok_or(AppError::Unauthorized)?;

    verify_token(secret, &token, now_secs)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const SECRET: &str = "test-secret";

    fn claims() -> Claims {
        Claims {
            sub: "user-1".to_string(),
            email: Some("a@b.com".to_string()),
            name: Some("Asha".to_string()),
            exp: 2_000,
        }
    }

    #[test]
    fn test_round_trip() {
        let token = mint_token(SECRET, &claims());

        assert_eq!(verify_token(SECRET, &token, 1_000).unwrap(), claims());
    }

    #[test]
    fn test_expired() {
        let token = mint_token(SECRET, &claims());

        assert!(verify_token(SECRET, &token, 2_000).is_err());
        assert!(verify_token(SECRET, &token, 3_000).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let token = mint_token(SECRET, &claims());

        assert!(verify_token("other-secret", &token, 1_000).is_err());
    }

    #[test]
    fn test_tampered_payload() {
        let token = mint_token(SECRET, &claims());
        let mut segments: Vec<&str> = token.split('.').collect();

        let mut forged = claims();
        forged.sub = "user-2".to_string();
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        segments[1] = &payload;

        assert!(verify_token(SECRET, &segments.join("."), 1_000).is_err());
    }

    #[test]
    fn test_rejects_unsigned_alg() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims()).unwrap());
        let token = format!("{header}.{payload}.");

        assert!(verify_token(SECRET, &token, 1_000).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(verify_token(SECRET, "", 1_000).is_err());
        assert!(verify_token(SECRET, "a.b", 1_000).is_err());
        assert!(verify_token(SECRET, "a.b.c.d", 1_000).is_err());
    }

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=abc123; other=1"),
        );

        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_authenticate_from_cookie() {
        let token = mint_token(SECRET, &claims());
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        );

        let resolved = authenticate(Some(SECRET), &headers, 1_000).unwrap();
        assert_eq!(resolved.sub, "user-1");
        assert_eq!(resolved.display_name("fallback"), "Asha");

        assert!(authenticate(Some(SECRET), &HeaderMap::new(), 1_000).is_err());
        assert!(authenticate(None, &headers, 1_000).is_err());
    }
}
