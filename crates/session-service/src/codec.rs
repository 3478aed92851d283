//! Signed-credential codec.
//!
//! Encodes and decodes the HS256 JWTs used as access and refresh tokens.
//!
//! # Claims
//!
//! - `uid`: authenticated user id
//! - `iat` / `exp`: issue and expiry timestamps (Unix epoch seconds)
//! - `jti`: rotation identifier, present on refresh tokens only
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted; `none` and every other algorithm are rejected
//!   before the signature is computed (algorithm substitution defense)
//! - `iat` more than the configured clock skew in the future is rejected
//! - Decode failures collapse into two kinds, `MalformedOrForged` and
//!   `Expired`. What to do about them is the token service's business.

use crate::clock::Clock;
use common::jwt::{extract_alg, validate_iat_at};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use common::types::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// The only signing algorithm the codec produces or accepts.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Redis key prefix for refresh token rotation identifiers.
pub const RENEWAL_KEY_PREFIX: &str = "renewal:";

/// Which credential a token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived bearer token, verified statelessly.
    Access,
    /// Long-lived single-use refresh token, tracked in the renewal store.
    Renewal,
}

impl TokenKind {
    /// Label used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Renewal => "renewal",
        }
    }
}

/// Unique identifier embedded in a refresh token as `jti`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RotationId(String);

impl RotationId {
    /// Generate a fresh random rotation identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renewal store key for this identifier (`renewal:<id>`).
    pub fn store_key(&self) -> String {
        format!("{RENEWAL_KEY_PREFIX}{}", self.0)
    }
}

impl From<String> for RotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// A live rotation id is a bearer secret for the store entry; keep it out of logs.
impl fmt::Debug for RotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RotationId([REDACTED])")
    }
}

/// Claims carried by both token kinds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Authenticated user.
    pub uid: UserId,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Rotation identifier. Only refresh tokens carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl SessionClaims {
    /// Rotation identifier, if present and non-empty.
    pub fn rotation_id(&self) -> Option<RotationId> {
        self.jti
            .as_deref()
            .filter(|jti| !jti.is_empty())
            .map(|jti| RotationId(jti.to_string()))
    }

    /// Token kind implied by the claims.
    pub fn kind(&self) -> TokenKind {
        if self.rotation_id().is_some() {
            TokenKind::Renewal
        } else {
            TokenKind::Access
        }
    }

    /// A token is expired from its `exp` second onwards.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("uid", &self.uid)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("jti", &self.jti.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug)]
pub struct EncodedToken {
    /// Compact JWT.
    pub token: SecretString,
    /// Claims embedded in `token`.
    pub claims: SessionClaims,
}

/// Codec failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Bad signature, encoding, shape, algorithm or `iat`.
    #[error("Token is malformed or forged")]
    MalformedOrForged,

    /// Signature is valid but `exp` has passed.
    #[error("Token has expired")]
    Expired,

    /// Signing failed; always an internal error.
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// HS256 token encoder/decoder bound to the server secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
    clock_skew: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("secret", &"[REDACTED]")
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenCodec {
    /// Create a codec from the symmetric signing secret.
    pub fn new(secret: &SecretBox<Vec<u8>>, clock: Arc<dyn Clock>, clock_skew: Duration) -> Self {
        let secret = secret.expose_secret();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            clock,
            clock_skew,
        }
    }

    /// Current time according to the codec's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Sign a new token for `user_id` valid for `ttl`.
    ///
    /// Refresh tokens get a freshly generated rotation identifier.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Signing` if the TTL is out of range or signing fails.
    pub fn encode(
        &self,
        user_id: UserId,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<EncodedToken, CodecError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| CodecError::Signing("TTL out of range".to_string()))?;
        let now = self.clock.now();

        let claims = SessionClaims {
            uid: user_id,
            iat: now,
            exp: now.saturating_add(ttl_secs),
            jti: match kind {
                TokenKind::Access => None,
                TokenKind::Renewal => Some(RotationId::generate().0),
            },
        };

        let mut header = Header::new(SIGNING_ALGORITHM);
        header.typ = Some("JWT".to_string());

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(target: "session.codec", error = %e, kind = kind.as_str(), "JWT signing failed");
            CodecError::Signing(format!("JWT signing operation failed: {e}"))
        })?;

        Ok(EncodedToken {
            token: SecretString::from(token),
            claims,
        })
    }

    /// Verify and decode a token, rejecting expired ones.
    ///
    /// # Errors
    ///
    /// - `MalformedOrForged` - size, algorithm, signature, shape or `iat` check failed
    /// - `Expired` - signature valid but `exp` has passed
    pub fn decode(&self, token: &str) -> Result<SessionClaims, CodecError> {
        let claims = self.verify(token)?;

        let now = self.clock.now();
        if claims.is_expired_at(now) {
            debug!(
                target: "session.codec",
                exp = claims.exp,
                now = now,
                kind = claims.kind().as_str(),
                "Token rejected: expired"
            );
            return Err(CodecError::Expired);
        }

        Ok(claims)
    }

    /// Verify a token's signature and shape without checking `exp`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedOrForged` for every failure.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<SessionClaims, CodecError> {
        self.verify(token)
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, CodecError> {
        // Size check and header inspection happen before any HMAC work
        let alg = extract_alg(token).map_err(|e| {
            debug!(target: "session.codec", error = ?e, "Token header rejected");
            CodecError::MalformedOrForged
        })?;

        if alg != "HS256" {
            warn!(target: "session.codec", alg = %alg, "Token rejected: unexpected algorithm");
            return Err(CodecError::MalformedOrForged);
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the injectable clock in `decode`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!(target: "session.codec", error = %e, "Token verification failed");
                CodecError::MalformedOrForged
            })?;

        let claims = token_data.claims;

        validate_iat_at(claims.iat, self.clock_skew, self.clock.now()).map_err(|e| {
            debug!(target: "session.codec", error = ?e, "Token iat validation failed");
            CodecError::MalformedOrForged
        })?;

        Ok(claims)
    }
}
