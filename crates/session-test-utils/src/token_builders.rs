//! Builder for forged test tokens.
//!
//! The service only issues well-formed tokens. This builder produces the rest:
//! expired, future-dated, wrongly signed, missing claims, other algorithms.

use crate::test_ids::{TEST_JWT_SECRET, TEST_USER_ID};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use common::types::UserId;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for test token claims and signatures.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user(UserId(7))
///     .as_refresh_token("rotation-id")
///     .expires_in(-60)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    uid: Option<i64>,
    iat: Option<i64>,
    exp: Option<i64>,
    jti: Option<String>,
    algorithm: Algorithm,
    secret: Vec<u8>,
}

impl TestTokenBuilder {
    /// Access token claims for [`TEST_USER_ID`], valid for 15 minutes from
    /// the wall clock, signed with [`TEST_JWT_SECRET`].
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    /// Same as [`TestTokenBuilder::new`] but relative to `now`, for tests on
    /// a mock clock.
    pub fn at(now: i64) -> Self {
        Self {
            uid: Some(TEST_USER_ID.get()),
            iat: Some(now),
            exp: Some(now + Duration::minutes(15).num_seconds()),
            jti: None,
            algorithm: Algorithm::HS256,
            secret: TEST_JWT_SECRET.as_bytes().to_vec(),
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.uid = Some(user_id.get());
        self
    }

    /// Add a rotation id, making this a refresh token.
    pub fn as_refresh_token(mut self, rotation_id: &str) -> Self {
        self.jti = Some(rotation_id.to_string());
        self
    }

    /// Set expiration relative to `iat`. Negative values produce an already
    /// expired token.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        let base = self.iat.unwrap_or_else(|| Utc::now().timestamp());
        self.exp = Some(base + seconds);
        self
    }

    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = Some(timestamp);
        self
    }

    pub fn without_user(mut self) -> Self {
        self.uid = None;
        self
    }

    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn without_issued_at(mut self) -> Self {
        self.iat = None;
        self
    }

    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.as_bytes().to_vec();
        self
    }

    /// HMAC variant to sign with (HS256, HS384 or HS512).
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Build the claims as a JSON value.
    pub fn build(&self) -> Value {
        let mut claims = Map::new();
        if let Some(uid) = self.uid {
            claims.insert("uid".to_string(), json!(uid));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(jti) = &self.jti {
            claims.insert("jti".to_string(), json!(jti));
        }
        Value::Object(claims)
    }

    /// Sign the claims and return the compact token.
    pub fn sign(self) -> String {
        let claims = self.build();
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());

        encode(&header, &claims, &EncodingKey::from_secret(&self.secret))
            .expect("HMAC signing of test claims cannot fail")
    }

    /// Produce an `alg: none` token with an empty signature.
    pub fn unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(self.build().to_string().as_bytes());
        format!("{header}.{payload}.")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
