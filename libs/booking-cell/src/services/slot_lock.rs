use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::store::{return_representation, StoreClient, StoreError};

/// How long a slot lock is honoured before contenders may reap it.
/// Long enough for a booking round-trip, short enough that a crashed
/// writer cannot block a slot for long.
const LOCK_TTL_SECONDS: i64 = 30;

pub fn slot_lock_key(doctor_id: Uuid, start_time: DateTime<Utc>) -> String {
    format!("slot_{}_{}", doctor_id, start_time.timestamp())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    Acquired,
    Contended,
}

#[derive(Debug, Deserialize)]
struct SlotLock {
    #[allow(dead_code)]
    lock_key: String,
    locked_at: DateTime<Utc>,
}

/// Advisory locks over booking slots, backed by a `slot_locks` table
/// with a unique `lock_key`. The store rejecting a duplicate insert is
/// the mutual-exclusion primitive: exactly one contender's insert
/// succeeds per key.
pub struct SlotLockService<'a> {
    store: &'a StoreClient,
}

impl<'a> SlotLockService<'a> {
    pub fn new(store: &'a StoreClient) -> Self {
        Self { store }
    }

    pub async fn acquire(
        &self,
        lock_key: &str,
        auth_token: Option<&str>,
    ) -> Result<LockAcquisition, StoreError> {
        match self.try_insert(lock_key, auth_token).await {
            Ok(()) => Ok(LockAcquisition::Acquired),
            Err(StoreError::Duplicate(_)) => {
                // The holder may have crashed. Reap the lock if its TTL
                // has elapsed, then contend once more.
                if self.reap_if_expired(lock_key, auth_token).await? {
                    match self.try_insert(lock_key, auth_token).await {
                        Ok(()) => Ok(LockAcquisition::Acquired),
                        Err(StoreError::Duplicate(_)) => Ok(LockAcquisition::Contended),
                        Err(err) => Err(err),
                    }
                } else {
                    Ok(LockAcquisition::Contended)
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn release(&self, lock_key: &str, auth_token: Option<&str>) -> Result<(), StoreError> {
        let path = format!("/rest/v1/slot_locks?lock_key=eq.{}", lock_key);
        let _: Vec<serde_json::Value> = self
            .store
            .request_with_headers(
                Method::DELETE,
                &path,
                auth_token,
                None,
                Some(return_representation()),
            )
            .await?;
        debug!("Released slot lock {}", lock_key);
        Ok(())
    }

    async fn try_insert(&self, lock_key: &str, auth_token: Option<&str>) -> Result<(), StoreError> {
        let body = json!({
            "lock_key": lock_key,
            "locked_at": Utc::now(),
        });
        let _: Vec<serde_json::Value> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/slot_locks",
                auth_token,
                Some(body),
                Some(return_representation()),
            )
            .await?;
        debug!("Acquired slot lock {}", lock_key);
        Ok(())
    }

    /// Deletes the lock if it is older than the TTL. Returns whether
    /// the caller should retry its insert.
    async fn reap_if_expired(
        &self,
        lock_key: &str,
        auth_token: Option<&str>,
    ) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/slot_locks?lock_key=eq.{}", lock_key);
        let existing: Vec<SlotLock> = self
            .store
            .request(Method::GET, &path, auth_token, None)
            .await?;

        let expired = existing
            .first()
            .map(|lock| Utc::now() - lock.locked_at > Duration::seconds(LOCK_TTL_SECONDS))
            // Holder released between our insert and this read.
            .unwrap_or(true);

        if expired && !existing.is_empty() {
            warn!("Reaping expired slot lock {}", lock_key);
            self.release(lock_key, auth_token).await?;
        }

        Ok(expired)
    }
}
