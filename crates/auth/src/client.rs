// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry-on-401 wrapper for downstream API calls.
//!
//! Wraps arbitrary async operations (REST calls, GraphQL queries) behind a
//! uniform policy: exactly one coordinated refresh-and-retry when a call
//! fails with HTTP 401, everything else forwarded untouched. The wrapper
//! holds no token state of its own — all reads and mutations go through the
//! coordinator, keeping the retry policy orthogonal to the locking policy.

use std::future::Future;
use std::sync::Arc;

use crate::coordinator::RefreshCoordinator;
use crate::error::AuthError;

/// The one status that triggers a coordinated refresh-and-retry.
const STATUS_UNAUTHORIZED: u16 = 401;

/// Error from a wrapped downstream API operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The downstream API answered with an error status.
    #[error("api call failed with status {status}")]
    Http { status: u16, body: String },
    /// Credential handling failed before or during the call.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The request never produced an HTTP response.
    #[error("api transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

/// Wraps downstream API operations with a single coordinated
/// refresh-and-retry on HTTP 401.
#[derive(Clone)]
pub struct ApiClient {
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Run `op` with the current access token, retrying once after a
    /// coordinated refresh when it fails with HTTP 401.
    ///
    /// Only an [`ApiError::Http`] whose status is exactly 401 triggers the
    /// retry; any other status or error shape is forwarded unchanged, as is
    /// a failure of the retried attempt. At most two underlying attempts per
    /// logical call.
    pub async fn execute<T, F, Fut>(&self, identity: &str, op: F) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        // The refresh token is captured up front so a 401 is tied to the
        // exact token generation this call used.
        let token = self.coordinator.current_token(identity).await?;
        match op(token.access_token.clone()).await {
            Err(ApiError::Http { status: STATUS_UNAUTHORIZED, .. }) => {
                tracing::debug!(identity, "call rejected with 401, refreshing and retrying");
                let access =
                    self.coordinator.refresh_access_token(identity, &token.refresh_token).await?;
                op(access).await
            }
            other => other,
        }
    }
}

/// Send a prepared request and decode the JSON body, mapping error statuses
/// into [`ApiError::Http`]. An empty success body decodes as `null`.
pub async fn send_json(req: reqwest::RequestBuilder) -> Result<serde_json::Value, ApiError> {
    let resp = req.send().await.map_err(|e| ApiError::Transport(e.into()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Http { status: status.as_u16(), body });
    }
    let bytes = resp.bytes().await.map_err(|e| ApiError::Transport(e.into()))?;
    if bytes.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Transport(e.into()))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
