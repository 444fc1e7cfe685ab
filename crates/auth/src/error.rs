// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the auth core.

use thiserror::Error;

/// Failure decoding a persisted token record.
///
/// Validation runs field-by-field, so a truncated or corrupt record names the
/// specific field at fault instead of a generic parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The record is not valid JSON at all.
    #[error("token record is not valid JSON: {0}")]
    Syntax(String),
    /// A required field is absent or not a string.
    #[error("token record is missing field `{0}`")]
    MissingField(&'static str),
    /// A date field is present but does not parse as an RFC 3339 timestamp.
    #[error("token record field `{field}` is not a valid timestamp: `{value}`")]
    InvalidDate { field: &'static str, value: String },
}

/// Errors surfaced by the token repository and the refresh coordinator.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credentials for the identity: missing record, corrupt
    /// record, or both tokens expired. Terminal — the caller must restart
    /// the authorization flow.
    #[error("not authorized: {0}")]
    Unauthorized(String),
    /// The backing lock service could not grant the mutex. Never retried
    /// here; there is no fallback to refreshing without the lock.
    #[error("lock unavailable for `{key}`: {source}")]
    LockUnavailable {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    /// The upstream refresh-grant call failed. The mutex is still released
    /// and the stored token is left unchanged.
    #[error("upstream token refresh failed: {0}")]
    UpstreamRefresh(#[source] anyhow::Error),
    /// The key-value store itself failed.
    #[error("token store error: {0}")]
    Store(#[source] anyhow::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
