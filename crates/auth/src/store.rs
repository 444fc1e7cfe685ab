// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token repository: identity-keyed persistence over a key-value collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AuthError;
use crate::token::OAuthToken;

/// Abstract key-value collaborator backing the repository.
///
/// Implementations must be safe for concurrent use; atomicity of a
/// single-key write is the store's responsibility, not the repository's.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for `key`, or `None` when absent.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Identity-keyed storage of OAuth token records.
///
/// Owns the persisted bytes: callers only ever see decoded [`OAuthToken`]
/// values. A missing, empty, or undecodable record is reported uniformly as
/// [`AuthError::Unauthorized`], so storage internals do not leak to callers.
#[derive(Clone)]
pub struct TokenRepository {
    store: Arc<dyn KeyValueStore>,
}

impl TokenRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(identity: &str) -> String {
        format!("authToken[{identity}]")
    }

    /// Load the token record for `identity`.
    pub async fn get(&self, identity: &str) -> Result<OAuthToken, AuthError> {
        let raw = self.store.get(&Self::key(identity)).await.map_err(AuthError::Store)?;
        let raw = match raw {
            Some(r) if !r.is_empty() => r,
            _ => {
                return Err(AuthError::Unauthorized(format!("no token stored for `{identity}`")))
            }
        };
        match OAuthToken::decode(&raw) {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::warn!(identity, err = %e, "stored token record failed validation");
                Err(AuthError::Unauthorized(format!("no valid token stored for `{identity}`")))
            }
        }
    }

    /// Store a token record wholesale, replacing any previous value.
    pub async fn set(&self, identity: &str, token: &OAuthToken) -> Result<(), AuthError> {
        self.store.set(&Self::key(identity), &token.encode()).await.map_err(AuthError::Store)
    }

    /// Delete the record for `identity` (sign-out / session teardown).
    pub async fn delete(&self, identity: &str) -> Result<(), AuthError> {
        self.store.delete(&Self::key(identity)).await.map_err(AuthError::Store)
    }
}

/// Process-local key-value store.
///
/// Used in tests and single-node deployments; production deployments put an
/// external store behind the same trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
