//! Token service: issuance, verification, rotation and revocation.
//!
//! Each refresh token moves through `ISSUED -> (REDEEMED | EXPIRED | REVOKED)`,
//! all terminal. The renewal store is the only authority on whether a
//! refresh token is still `ISSUED`; access tokens are verified from their
//! signature and expiry alone.
//!
//! # Error mapping
//!
//! | Codec outcome                         | Access token          | Refresh token          |
//! |---------------------------------------|-----------------------|------------------------|
//! | `MalformedOrForged`                   | `AccessTokenInvalid`  | `RenewalTokenInvalid`  |
//! | `Expired`, genuine refresh token      | `AccessTokenExpired`  | `RenewalTokenExpired`  |
//! | `Expired`, no rotation id             | `AccessTokenExpired`  | `RenewalTokenInvalid`  |
//! | valid, wrong kind                     | `AccessTokenInvalid`  | `RenewalTokenInvalid`  |

use crate::codec::{CodecError, SessionClaims, TokenCodec, TokenKind};
use crate::errors::SessionError;
use crate::observability::metrics::{
    record_access_verification, record_renewal_revocation, record_token_issuance,
    record_token_rotation,
};
use crate::store::{ConsumeOutcome, RenewalStore, StoreError};
use common::secret::SecretString;
use common::types::UserId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Credentials handed to a client after login, registration or rotation.
#[derive(Debug)]
pub struct TokenPair {
    pub user_id: UserId,
    pub access_token: SecretString,
    pub renewal_token: SecretString,
    /// Absolute expiry of the access token (Unix epoch seconds).
    pub access_expires_at: i64,
    /// Absolute expiry of the refresh token (Unix epoch seconds).
    pub renewal_expires_at: i64,
}

pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn RenewalStore>,
    access_ttl: Duration,
    renewal_ttl: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn RenewalStore>,
        access_ttl: Duration,
        renewal_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            access_ttl,
            renewal_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn renewal_ttl(&self) -> Duration {
        self.renewal_ttl
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a fresh access/refresh pair for `user_id` and record the refresh
    /// token's rotation identifier in the store.
    ///
    /// # Errors
    ///
    /// Signing or store failures surface as internal errors and are not retried.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn issue_token_pair(&self, user_id: UserId) -> Result<TokenPair, SessionError> {
        let start = Instant::now();
        let result = self.issue(user_id).await;

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(status, start.elapsed());

        result
    }

    async fn issue(&self, user_id: UserId) -> Result<TokenPair, SessionError> {
        let access = self.codec.encode(user_id, TokenKind::Access, self.access_ttl)?;
        let renewal = self
            .codec
            .encode(user_id, TokenKind::Renewal, self.renewal_ttl)?;

        let rotation_id = renewal.claims.rotation_id().ok_or_else(|| {
            SessionError::Internal("refresh token issued without rotation id".to_string())
        })?;

        self.store
            .insert(&rotation_id, user_id, self.renewal_ttl)
            .await?;

        debug!(
            target: "session.token_service",
            user_id = %user_id,
            access_expires_at = access.claims.exp,
            "Issued token pair"
        );

        Ok(TokenPair {
            user_id,
            access_token: access.token,
            renewal_token: renewal.token,
            access_expires_at: access.claims.exp,
            renewal_expires_at: renewal.claims.exp,
        })
    }

    /// Verify an access token and return the identity it was issued for.
    ///
    /// Stateless: the renewal store is not consulted.
    ///
    /// # Errors
    ///
    /// - `AccessTokenExpired` - genuine token past its `exp`
    /// - `AccessTokenInvalid` - anything else, including a refresh token
    pub fn verify_access_token(&self, token: &str) -> Result<UserId, SessionError> {
        let result = match self.codec.decode(token) {
            Ok(claims) if claims.kind() == TokenKind::Renewal => {
                debug!(
                    target: "session.token_service",
                    user_id = %claims.uid,
                    "Refresh token presented as access token"
                );
                Err(SessionError::AccessTokenInvalid)
            }
            Ok(claims) => Ok(claims.uid),
            Err(CodecError::Expired) => Err(SessionError::AccessTokenExpired),
            Err(CodecError::MalformedOrForged | CodecError::Signing(_)) => {
                Err(SessionError::AccessTokenInvalid)
            }
        };

        record_access_verification(outcome_label(&result));
        result
    }

    /// Redeem a refresh token and issue a brand-new pair.
    ///
    /// The presented token's rotation identifier is consumed atomically, so
    /// of two concurrent rotations of the same token exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `RenewalTokenInvalid` - forged, wrong kind, already redeemed,
    ///   revoked or lapsed in the store
    /// - `RenewalTokenExpired` - genuine refresh token past its `exp`
    /// - `Store` / `Crypto` - internal failures
    #[instrument(skip_all)]
    pub async fn rotate_tokens(&self, renewal_token: &str) -> Result<TokenPair, SessionError> {
        let result = self.rotate(renewal_token).await;
        record_token_rotation(outcome_label(&result));
        result
    }

    async fn rotate(&self, renewal_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.decode_renewal(renewal_token)?;

        let Some(rotation_id) = claims.rotation_id() else {
            debug!(
                target: "session.token_service",
                user_id = %claims.uid,
                "Access token presented as refresh token"
            );
            return Err(SessionError::RenewalTokenInvalid);
        };

        // Already covered by the codec; kept so the store is never touched
        // for an expired token whatever the decode path.
        if claims.is_expired_at(self.codec.now()) {
            return Err(SessionError::RenewalTokenExpired);
        }

        match self.store.consume(&rotation_id, claims.uid).await? {
            ConsumeOutcome::Consumed => {}
            outcome @ (ConsumeOutcome::Absent | ConsumeOutcome::OwnerMismatch) => {
                warn!(
                    target: "session.token_service",
                    user_id = %claims.uid,
                    outcome = outcome.as_str(),
                    "Refresh token rejected by renewal store"
                );
                return Err(SessionError::RenewalTokenInvalid);
            }
        }

        let pair = self.issue_token_pair(claims.uid).await?;

        info!(
            target: "session.token_service",
            user_id = %claims.uid,
            "Rotated refresh token"
        );

        Ok(pair)
    }

    fn decode_renewal(&self, token: &str) -> Result<SessionClaims, SessionError> {
        match self.codec.decode(token) {
            Ok(claims) => Ok(claims),
            Err(CodecError::Expired) => {
                // Classify the expired token: only a genuine refresh token
                // reports expiry, anything else is simply invalid.
                match self.codec.decode_ignoring_expiry(token) {
                    Ok(claims) if claims.rotation_id().is_some() => {
                        debug!(
                            target: "session.token_service",
                            user_id = %claims.uid,
                            "Refresh token expired"
                        );
                        Err(SessionError::RenewalTokenExpired)
                    }
                    _ => Err(SessionError::RenewalTokenInvalid),
                }
            }
            Err(CodecError::MalformedOrForged | CodecError::Signing(_)) => {
                Err(SessionError::RenewalTokenInvalid)
            }
        }
    }

    /// Revoke a refresh token server-side (logout).
    ///
    /// Expired tokens are still revoked; malformed tokens and access tokens
    /// are ignored. Returns whether a live store entry was deleted.
    ///
    /// # Errors
    ///
    /// Only store failures.
    #[instrument(skip_all)]
    pub async fn revoke_renewal_token(&self, renewal_token: &str) -> Result<bool, SessionError> {
        let rotation = match self.codec.decode_ignoring_expiry(renewal_token) {
            Ok(claims) => claims.rotation_id().map(|id| (id, claims.uid)),
            Err(_) => None,
        };

        let Some((rotation_id, user_id)) = rotation else {
            record_renewal_revocation("ignored");
            return Ok(false);
        };

        let revoked = self.store.revoke(&rotation_id).await?;
        record_renewal_revocation(if revoked { "revoked" } else { "absent" });

        info!(
            target: "session.token_service",
            user_id = %user_id,
            revoked,
            "Refresh token revoked"
        );

        Ok(revoked)
    }

    /// Readiness: whether the renewal store answers.
    pub async fn check_store(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

fn outcome_label<T>(result: &Result<T, SessionError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(SessionError::AccessTokenExpired | SessionError::RenewalTokenExpired) => "expired",
        Err(err) if err.is_internal() => "error",
        Err(_) => "invalid",
    }
}
