//! Redis-backed renewal store.
//!
//! # Connection Pattern
//!
//! `MultiplexedConnection` is cheap to clone and safe to use concurrently,
//! so every operation clones it instead of sharing it behind a lock.
//!
//! Every round-trip is bounded by `op_timeout`. A timeout or connection
//! failure becomes a `StoreError` and is never retried here.

use super::lua_scripts;
use super::{ConsumeOutcome, RenewalStore, StoreError};
use crate::codec::RotationId;
use crate::observability::metrics::record_store_operation;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::UserId;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult, Script};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Renewal store backed by Redis keys with per-key TTL.
#[derive(Clone)]
pub struct RedisRenewalStore {
    connection: MultiplexedConnection,
    consume_script: Script,
    op_timeout: Duration,
}

impl RedisRenewalStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the URL is invalid or the
    /// connection cannot be established, `StoreError::Timeout` if it takes
    /// longer than `op_timeout`.
    pub async fn connect(redis_url: &SecretString, op_timeout: Duration) -> Result<Self, StoreError> {
        // Do NOT log redis_url: it may carry credentials (redis://:password@host:port)
        let client = Client::open(redis_url.expose_secret()).map_err(|e| {
            error!(target: "session.store.redis", error = %e, "Failed to open Redis client");
            StoreError::Unavailable(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = tokio::time::timeout(op_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                error!(target: "session.store.redis", "Timed out connecting to Redis");
                StoreError::Timeout("connect")
            })?
            .map_err(|e| {
                error!(target: "session.store.redis", error = %e, "Failed to connect to Redis");
                StoreError::Unavailable(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self {
            connection,
            consume_script: Script::new(lua_scripts::CONSUME_RENEWAL),
            op_timeout,
        })
    }

    /// Run one Redis round-trip under the operation timeout, recording its
    /// duration and outcome.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(target: "session.store.redis", error = %e, operation, "Redis operation failed");
                Err(StoreError::Unavailable(format!("{operation} failed: {e}")))
            }
            Err(_) => {
                warn!(
                    target: "session.store.redis",
                    operation,
                    timeout_ms = u64::try_from(self.op_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Redis operation timed out"
                );
                Err(StoreError::Timeout(operation))
            }
        };

        let status = if result.is_ok() { "success" } else { "error" };
        record_store_operation(operation, status, start.elapsed());
        result
    }
}

#[async_trait]
impl RenewalStore for RedisRenewalStore {
    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn insert(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        // Clone the connection (cheap operation) for this request
        let mut conn = self.connection.clone();
        let key = rotation_id.store_key();
        let ttl_secs = ttl.as_secs().max(1);

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(user_id.get()).arg("EX").arg(ttl_secs);

        let _: () = self.bounded("insert", cmd.query_async(&mut conn)).await?;

        debug!(target: "session.store.redis", user_id = %user_id, ttl_secs, "Stored renewal entry");
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn consume(
        &self,
        rotation_id: &RotationId,
        user_id: UserId,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut conn = self.connection.clone();
        let key = rotation_id.store_key();

        let mut invocation = self.consume_script.key(&key);
        invocation.arg(user_id.get().to_string());

        let result: i64 = self
            .bounded("consume", invocation.invoke_async(&mut conn))
            .await?;

        match result {
            1 => Ok(ConsumeOutcome::Consumed),
            0 => Ok(ConsumeOutcome::Absent),
            -1 => {
                warn!(
                    target: "session.store.redis",
                    user_id = %user_id,
                    "Renewal entry bound to a different user, entry deleted"
                );
                Ok(ConsumeOutcome::OwnerMismatch)
            }
            other => {
                error!(target: "session.store.redis", result = other, "Unexpected consume script result");
                Err(StoreError::Protocol(format!(
                    "consume script returned {other}"
                )))
            }
        }
    }

    #[instrument(skip_all)]
    async fn revoke(&self, rotation_id: &RotationId) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let key = rotation_id.store_key();

        let mut cmd = redis::cmd("DEL");
        cmd.arg(&key);

        let deleted: i64 = self.bounded("revoke", cmd.query_async(&mut conn)).await?;
        Ok(deleted > 0)
    }

    #[instrument(skip_all)]
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let cmd = redis::cmd("PING");

        let reply: String = self.bounded("ping", cmd.query_async(&mut conn)).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("unexpected PING reply: {reply}")))
        }
    }
}
