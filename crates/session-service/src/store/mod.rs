//! Renewal store: server-side record of which refresh tokens are still live.
//!
//! # Key Pattern
//!
//! - `renewal:<jti>` - decimal user id, expires with the refresh token
//!
//! An entry is created when a refresh token is issued, consumed atomically
//! when the token is redeemed, and deleted on logout. Otherwise the store's
//! TTL removes it.

mod lua_scripts;
pub mod memory;
pub mod redis;

pub use self::memory::InMemoryRenewalStore;
pub use self::redis::RedisRenewalStore;

use crate::codec::RotationId;
use async_trait::async_trait;
use common::types::UserId;
use std::time::Duration;
use thiserror::Error;

/// Result of redeeming a rotation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Entry existed for the expected user and has been deleted.
    Consumed,
    /// No entry: never issued, already redeemed, revoked or lapsed.
    Absent,
    /// Entry existed but belonged to another user. It has been deleted.
    OwnerMismatch,
}

impl ConsumeOutcome {
    /// Label used for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ConsumeOutcome::Consumed => "consumed",
            ConsumeOutcome::Absent => "absent",
            ConsumeOutcome::OwnerMismatch => "owner_mismatch",
        }
    }
}

/// Renewal store failures. All of them surface as internal errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Renewal store unavailable: {0}")]
    Unavailable(String),

    #[error("Renewal store operation timed out: {0}")]
    Timeout(&'static str),

    #[error("Unexpected renewal store response: {0}")]
    Protocol(String),
}

/// Storage for live refresh token rotation identifiers.
#[async_trait]
pub trait RenewalStore: Send + Sync {
    /// Record a freshly issued rotation identifier for `user_id`, expiring after `ttl`.
    async fn insert(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Atomically fetch and delete the entry for `rotation_id`.
    ///
    /// At most one caller ever observes `Consumed` for a given identifier.
    async fn consume(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Delete the entry for `rotation_id`. Returns whether one existed.
    async fn revoke(&self, rotation_id: &RotationId) -> Result<bool, StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
