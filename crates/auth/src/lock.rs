// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed mutex over an external lock service.
//!
//! A [`LockManager`] mints one single-use [`DistributedMutex`] handle per
//! critical section, keyed `mutexAccessToken[<id>]`. Handles identify
//! themselves to the service with a random owner token so a handle can only
//! ever release its own acquisition. Crash recovery relies on the service's
//! lease TTL, not on anything in this module.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AuthError;

/// Give up acquiring after this long by default.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Initial delay between acquisition attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ceiling for the acquisition backoff.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Lease requested from the lock service; reclaims the lock if the holding
/// process dies mid-refresh.
const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// Abstract cross-process lock service (e.g. a Redis-backed semaphore).
///
/// `try_acquire` must be atomic per key: at most one owner holds a key at a
/// time, and a granted lease expires after `ttl` if never released.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Attempt to take `key` for `owner`. Returns `false` when already held.
    async fn try_acquire(&self, key: &str, owner: &str, ttl: Duration) -> anyhow::Result<bool>;
    /// Release `key` if still held by `owner`.
    async fn release(&self, key: &str, owner: &str) -> anyhow::Result<()>;
}

/// Tuning for mutex acquisition.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Fail with `LockUnavailable` after waiting this long for a contended
    /// lock.
    pub acquire_timeout: Duration,
    /// Initial delay between acquisition attempts; doubles per attempt.
    pub poll_interval: Duration,
    /// Lease duration requested from the service on each acquisition.
    pub lease_ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }
}

/// Mints single-use mutex handles keyed by identity.
#[derive(Clone)]
pub struct LockManager {
    service: Arc<dyn LockService>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(service: Arc<dyn LockService>) -> Self {
        Self::with_config(service, LockConfig::default())
    }

    pub fn with_config(service: Arc<dyn LockService>, config: LockConfig) -> Self {
        Self { service, config }
    }

    /// A fresh handle for one critical section on `identity`'s token.
    pub fn mutex(&self, identity: &str) -> DistributedMutex {
        DistributedMutex {
            service: Arc::clone(&self.service),
            key: format!("mutexAccessToken[{identity}]"),
            owner: Uuid::new_v4().to_string(),
            config: self.config.clone(),
            held: false,
        }
    }
}

/// A single-use named lock handle: one acquire/release cycle per instance.
pub struct DistributedMutex {
    service: Arc<dyn LockService>,
    key: String,
    owner: String,
    config: LockConfig,
    held: bool,
}

impl DistributedMutex {
    /// Block cooperatively until the lock is held.
    ///
    /// Polls the service with exponential backoff until granted or
    /// `acquire_timeout` elapses. A service failure propagates immediately —
    /// there is no fallback to proceeding without the lock.
    pub async fn acquire(&mut self) -> Result<(), AuthError> {
        let deadline = tokio::time::Instant::now() + self.config.acquire_timeout;
        let mut backoff = self.config.poll_interval;
        loop {
            let granted = self
                .service
                .try_acquire(&self.key, &self.owner, self.config.lease_ttl)
                .await
                .map_err(|e| AuthError::LockUnavailable { key: self.key.clone(), source: e })?;
            if granted {
                self.held = true;
                return Ok(());
            }
            if tokio::time::Instant::now() + backoff >= deadline {
                return Err(AuthError::LockUnavailable {
                    key: self.key.clone(),
                    source: anyhow::anyhow!(
                        "timed out after {:?} waiting for contended lock",
                        self.config.acquire_timeout
                    ),
                });
            }
            tracing::debug!(key = %self.key, "lock contended, backing off");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_POLL_INTERVAL);
        }
    }

    /// Release the lock.
    ///
    /// Safe to call after a failed acquire, or twice; only a held lock is
    /// released. A backend failure is logged rather than raised — the lease
    /// TTL reclaims the lock either way.
    pub async fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        if let Err(e) = self.service.release(&self.key, &self.owner).await {
            tracing::warn!(key = %self.key, err = %e, "failed to release lock");
        }
    }

    /// Whether this handle currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Process-local lock service.
///
/// Leases are only meaningful across processes, so the TTL is ignored here.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    held: Mutex<HashMap<String, String>>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn try_acquire(&self, key: &str, owner: &str, _ttl: Duration) -> anyhow::Result<bool> {
        let mut held = self.held.lock().await;
        if held.contains_key(key) {
            return Ok(false);
        }
        held.insert(key.to_owned(), owner.to_owned());
        Ok(true)
    }

    async fn release(&self, key: &str, owner: &str) -> anyhow::Result<()> {
        let mut held = self.held.lock().await;
        if held.get(key).map(String::as_str) == Some(owner) {
            held.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
