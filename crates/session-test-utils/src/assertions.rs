//! Custom test assertions for expressive tests
//!
//! Inspect token structure and claims without verifying the signature.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::types::UserId;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    uid: i64,
    iat: i64,
    exp: i64,
    #[serde(default)]
    jti: Option<String>,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {index}"));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {index}: {e}"))
}

fn claims_of(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt()
///     .assert_for_user(UserId(42))
///     .assert_is_refresh_token()
///     .assert_lifetime(604_800);
/// ```
pub trait TokenAssertions {
    /// Three segments, HS256 header, parseable claims
    fn assert_valid_jwt(&self) -> &Self;

    fn assert_for_user(&self, user_id: UserId) -> &Self;

    /// No rotation id
    fn assert_is_access_token(&self) -> &Self;

    /// Carries a rotation id
    fn assert_is_refresh_token(&self) -> &Self;

    /// `exp - iat` equals `seconds`
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    fn assert_expires_at(&self, timestamp: i64) -> &Self;
}

impl TokenAssertions for str {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {parts}"
        );

        let header: JwtHeader =
            serde_json::from_slice(&segment(self, 0)).expect("Failed to parse JWT header JSON");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ.as_deref(), Some("JWT"), "Expected JWT type");

        claims_of(self);
        self
    }

    fn assert_for_user(&self, user_id: UserId) -> &Self {
        let claims = claims_of(self);
        assert_eq!(
            claims.uid,
            user_id.get(),
            "Expected uid {user_id}, got {}",
            claims.uid
        );
        self
    }

    fn assert_is_access_token(&self) -> &Self {
        let claims = claims_of(self);
        assert!(
            claims.jti.is_none(),
            "Expected an access token, but the token carries a rotation id"
        );
        self
    }

    fn assert_is_refresh_token(&self) -> &Self {
        let claims = claims_of(self);
        assert!(
            claims.jti.as_deref().is_some_and(|jti| !jti.is_empty()),
            "Expected a refresh token, but the token has no rotation id"
        );
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = claims_of(self);
        assert_eq!(
            claims.exp - claims.iat,
            seconds,
            "Expected a lifetime of {seconds} seconds, got {}",
            claims.exp - claims.iat
        );
        self
    }

    fn assert_expires_at(&self, timestamp: i64) -> &Self {
        let claims = claims_of(self);
        assert_eq!(
            claims.exp, timestamp,
            "Expected exp {timestamp}, got {}",
            claims.exp
        );
        self
    }
}
