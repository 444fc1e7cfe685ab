// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locking refresh coordinator: the single-flight token state machine.
//!
//! State lives entirely in the repository; the coordinator is stateless
//! between calls. The freshness check outside the lock is intentionally
//! lock-free — correctness comes from the re-read inside the critical
//! section plus the stale-token comparison, not from the outer read being
//! linearizable with concurrent writers.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::AuthError;
use crate::lock::LockManager;
use crate::refresh::TokenRefresher;
use crate::store::TokenRepository;
use crate::token::OAuthToken;

/// Safety margin subtracted from both expiry dates, so a token about to
/// expire mid-request already counts as stale.
const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 300;

/// Tuning for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Tokens within this margin of their expiry are treated as expired.
    pub expiry_margin: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { expiry_margin: Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS) }
    }
}

/// Keeps per-identity access tokens valid, refreshing at most once per token
/// generation under concurrency.
pub struct RefreshCoordinator {
    repo: TokenRepository,
    locks: LockManager,
    refresher: Arc<dyn TokenRefresher>,
    config: CoordinatorConfig,
}

impl RefreshCoordinator {
    pub fn new(
        repo: TokenRepository,
        locks: LockManager,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self::with_config(repo, locks, refresher, CoordinatorConfig::default())
    }

    pub fn with_config(
        repo: TokenRepository,
        locks: LockManager,
        refresher: Arc<dyn TokenRefresher>,
        config: CoordinatorConfig,
    ) -> Self {
        Self { repo, locks, refresher, config }
    }

    /// The stored token record, with no freshness validation.
    ///
    /// Call sites that only need to know which refresh token they would
    /// present later (e.g. the retry-on-401 wrapper) read through here.
    pub async fn current_token(&self, identity: &str) -> Result<OAuthToken, AuthError> {
        self.repo.get(identity).await
    }

    /// A valid access token for `identity`, refreshing if necessary.
    ///
    /// Fresh tokens return without touching the lock service. With the
    /// access token stale but the refresh token alive, this performs the
    /// coordinated refresh. With both expired there is no recovery and the
    /// caller must re-authenticate.
    pub async fn get_access_token(&self, identity: &str) -> Result<String, AuthError> {
        let token = self.repo.get(identity).await?;
        let now = Utc::now();
        if token.access_token_valid(now, self.config.expiry_margin) {
            return Ok(token.access_token);
        }
        if token.refresh_token_valid(now, self.config.expiry_margin) {
            return self.refresh_access_token(identity, &token.refresh_token).await;
        }
        Err(AuthError::Unauthorized(format!(
            "access and refresh tokens for `{identity}` have both expired"
        )))
    }

    /// Refresh the access token for `identity`, coordinating with concurrent
    /// callers.
    ///
    /// At most one caller per identity runs the critical section at a time.
    /// A caller whose `supplied_refresh_token` no longer matches the stored
    /// one raced a refresh that already completed and receives the stored
    /// access token without an upstream call. The mutex is released on every
    /// exit path.
    pub async fn refresh_access_token(
        &self,
        identity: &str,
        supplied_refresh_token: &str,
    ) -> Result<String, AuthError> {
        let mut mutex = self.locks.mutex(identity);
        mutex.acquire().await?;
        let result = self.refresh_locked(identity, supplied_refresh_token).await;
        mutex.release().await;
        result
    }

    /// Body of the critical section. Only runs while the identity's mutex is
    /// held.
    async fn refresh_locked(
        &self,
        identity: &str,
        supplied_refresh_token: &str,
    ) -> Result<String, AuthError> {
        // Re-read: another caller may have refreshed while we waited.
        let stored = self.repo.get(identity).await?;
        if stored.refresh_token != supplied_refresh_token {
            tracing::debug!(identity, "refresh token already rotated, skipping upstream call");
            return Ok(stored.access_token);
        }

        let refreshed = self
            .refresher
            .refresh(&stored.refresh_token)
            .await
            .map_err(AuthError::UpstreamRefresh)?;

        // Providers without refresh-token rotation return an empty token;
        // the stored one and its expiry stay in effect.
        let next = if refreshed.refresh_token.is_empty() {
            OAuthToken {
                refresh_token: stored.refresh_token,
                refresh_token_expiry_date: stored.refresh_token_expiry_date,
                ..refreshed
            }
        } else {
            refreshed
        };

        self.repo.set(identity, &next).await?;
        tracing::debug!(identity, "access token refreshed");
        Ok(next.access_token)
    }

    /// Remove stored credentials for `identity` (logout / session teardown).
    pub async fn sign_out(&self, identity: &str) -> Result<(), AuthError> {
        self.repo.delete(identity).await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
