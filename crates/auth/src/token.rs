// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth token record and its persisted JSON codec.
//!
//! The persisted form is a flat JSON object with exactly four fields
//! (`accessToken`, `refreshToken`, `accessTokenExpiryDate`,
//! `refreshTokenExpiryDate`); dates encode as RFC 3339 strings with
//! millisecond precision. Encode/decode are pure functions.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::DecodeError;

/// An OAuth token pair with expiry metadata.
///
/// Immutable value: a refresh replaces the whole record, never one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    /// Short-lived bearer credential for downstream API calls.
    pub access_token: String,
    /// Longer-lived credential exchanged once per refresh cycle.
    pub refresh_token: String,
    pub access_token_expiry_date: DateTime<Utc>,
    pub refresh_token_expiry_date: DateTime<Utc>,
}

impl OAuthToken {
    /// Serialize to the persisted JSON form.
    pub fn encode(&self) -> String {
        serde_json::json!({
            "accessToken": self.access_token,
            "refreshToken": self.refresh_token,
            "accessTokenExpiryDate": encode_date(self.access_token_expiry_date),
            "refreshTokenExpiryDate": encode_date(self.refresh_token_expiry_date),
        })
        .to_string()
    }

    /// Parse and validate a persisted record.
    ///
    /// All four fields must be present and both dates must parse; each
    /// failure reports the offending field.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Syntax(e.to_string()))?;
        Ok(Self {
            access_token: require_string(&value, "accessToken")?,
            refresh_token: require_string(&value, "refreshToken")?,
            access_token_expiry_date: require_date(&value, "accessTokenExpiryDate")?,
            refresh_token_expiry_date: require_date(&value, "refreshTokenExpiryDate")?,
        })
    }

    /// True when the access token is still usable at `now`, keeping `margin`
    /// of slack before the recorded expiry.
    pub fn access_token_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.access_token_expiry_date - margin > now
    }

    /// True when the refresh token is still usable at `now`.
    pub fn refresh_token_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.refresh_token_expiry_date - margin > now
    }
}

fn encode_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn require_string(value: &serde_json::Value, field: &'static str) -> Result<String, DecodeError> {
    match value.get(field) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        _ => Err(DecodeError::MissingField(field)),
    }
}

fn require_date(
    value: &serde_json::Value,
    field: &'static str,
) -> Result<DateTime<Utc>, DecodeError> {
    let raw = require_string(value, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DecodeError::InvalidDate { field, value: raw })
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
