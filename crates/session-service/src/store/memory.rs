//! In-process renewal store.
//!
//! Used by the test harness and by `STORE_BACKEND=memory` for local
//! development. An entry whose deadline has passed on the injected [`Clock`]
//! is treated as absent. Expired entries are swept on every insert so the
//! map stays bounded by the number of live sessions.

use super::{ConsumeOutcome, RenewalStore, StoreError};
use crate::clock::Clock;
use crate::codec::RotationId;
use async_trait::async_trait;
use common::types::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Entry {
    user_id: UserId,
    expires_at: i64,
}

/// Renewal store held in a `Mutex<HashMap>`.
///
/// The lock is never held across an `.await`.
pub struct InMemoryRenewalStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRenewalStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live (unexpired) entries.
    pub fn live_entries(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let entries = self.lock()?;
        Ok(entries.values().filter(|e| e.expires_at > now).count())
    }

    /// Whether a live entry exists for `rotation_id`.
    pub fn contains(&self, rotation_id: &RotationId) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let entries = self.lock()?;
        Ok(entries
            .get(&rotation_id.store_key())
            .is_some_and(|e| e.expires_at > now))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RenewalStore for InMemoryRenewalStore {
    async fn insert(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl_secs = i64::try_from(ttl.as_secs().max(1))
            .map_err(|_| StoreError::Protocol("TTL out of range".to_string()))?;
        let now = self.clock.now();
        let expires_at = now.saturating_add(ttl_secs);

        let mut entries = self.lock()?;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            rotation_id.store_key(),
            Entry {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn consume(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
    ) -> Result<ConsumeOutcome, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        // Remove under the lock: lookup and delete are one step
        let outcome = match entries.remove(&rotation_id.store_key()) {
            None => ConsumeOutcome::Absent,
            Some(entry) if entry.expires_at <= now => ConsumeOutcome::Absent,
            Some(entry) if entry.user_id == user_id => ConsumeOutcome::Consumed,
            Some(_) => ConsumeOutcome::OwnerMismatch,
        };
        Ok(outcome)
    }

    async fn revoke(&self, rotation_id: &RotationId) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        Ok(entries
            .remove(&rotation_id.store_key())
            .is_some_and(|e| e.expires_at > now))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
