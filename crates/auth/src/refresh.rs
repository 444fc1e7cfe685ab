// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream token refresher: collaborator trait plus an HTTP implementation
//! of the standard `refresh_token` grant (RFC 6749 §6).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::token::OAuthToken;

/// Refresh-token lifetime assumed when the provider rotates the refresh
/// token without reporting one.
const FALLBACK_REFRESH_TTL_DAYS: i64 = 30;

/// Upstream collaborator that exchanges a refresh token for a new pair.
///
/// The coordinator treats this as fully opaque; the provider's wire protocol
/// lives behind it. An empty `refresh_token` in the returned pair means the
/// provider does not rotate refresh tokens.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<OAuthToken>;
}

/// Standard `refresh_token` grant response.
#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    refresh_token_expires_in: Option<i64>,
}

/// Performs the `refresh_token` grant against a provider token endpoint
/// (form-encoded POST, JSON response).
pub struct HttpRefresher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
}

impl HttpRefresher {
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    /// Confidential clients (e.g. Azure DevOps apps) also present a secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }
}

#[async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<OAuthToken> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let resp = self.client.post(&self.token_url).form(&form).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("refresh grant failed ({status}): {text}");
        }
        let grant: GrantResponse = resp.json().await?;

        let now = Utc::now();
        let refresh_expiry = match grant.refresh_token_expires_in {
            Some(secs) => now + Duration::seconds(secs),
            None => now + Duration::days(FALLBACK_REFRESH_TTL_DAYS),
        };
        Ok(OAuthToken {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or_default(),
            access_token_expiry_date: now + Duration::seconds(grant.expires_in),
            refresh_token_expiry_date: refresh_expiry,
        })
    }
}
