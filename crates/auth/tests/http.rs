// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-level tests for the refresh grant and the JSON call helper.

use mockito::Matcher;

use spechub_auth::client::{self, ApiError};
use spechub_auth::refresh::{HttpRefresher, TokenRefresher};

#[tokio::test]
async fn refresh_grant_posts_form_and_parses_pair() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("client_id".into(), "portal".into()),
            Matcher::UrlEncoded("refresh_token".into(), "rt-1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"access_token":"at-2","refresh_token":"rt-2","expires_in":3600,"refresh_token_expires_in":86400}"#,
        )
        .create_async()
        .await;

    let refresher = HttpRefresher::new(format!("{}/oauth2/token", server.url()), "portal");
    let token = refresher.refresh("rt-1").await?;

    assert_eq!(token.access_token, "at-2");
    assert_eq!(token.refresh_token, "rt-2");
    assert!(token.access_token_expiry_date > chrono::Utc::now());
    assert!(token.refresh_token_expiry_date > token.access_token_expiry_date);
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn refresh_grant_sends_client_secret_when_configured() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::UrlEncoded("client_secret".into(), "shh".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-2","refresh_token":"rt-2","expires_in":3600}"#)
        .create_async()
        .await;

    let refresher = HttpRefresher::new(format!("{}/oauth2/token", server.url()), "portal")
        .with_client_secret("shh");
    refresher.refresh("rt-1").await?;
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn refresh_grant_error_status_fails_with_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/oauth2/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let refresher = HttpRefresher::new(format!("{}/oauth2/token", server.url()), "portal");
    let err = match refresher.refresh("rt-1").await {
        Err(e) => e,
        Ok(_) => panic!("expected the grant to fail"),
    };
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn non_rotating_provider_yields_empty_refresh_token() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-2","expires_in":3600}"#)
        .create_async()
        .await;

    let refresher = HttpRefresher::new(format!("{}/oauth2/token", server.url()), "portal");
    let token = refresher.refresh("rt-1").await?;
    // The coordinator keeps the stored refresh token when this is empty.
    assert!(token.refresh_token.is_empty());
    Ok(())
}

// ── send_json ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_json_decodes_success_body() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/projects")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"name":"payments-api"}]"#)
        .create_async()
        .await;

    let http = reqwest::Client::new();
    let value = client::send_json(http.get(format!("{}/projects", server.url())))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    assert_eq!(value[0]["name"], "payments-api");
    Ok(())
}

#[tokio::test]
async fn send_json_maps_error_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/projects")
        .with_status(401)
        .with_body("bad credentials")
        .create_async()
        .await;

    let http = reqwest::Client::new();
    let result = client::send_json(http.get(format!("{}/projects", server.url()))).await;
    match result {
        Err(ApiError::Http { status: 401, body }) => assert_eq!(body, "bad credentials"),
        other => panic!("expected Http 401, got {other:?}"),
    }
}

#[tokio::test]
async fn send_json_treats_empty_body_as_null() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("DELETE", "/projects/1").with_status(204).create_async().await;

    let http = reqwest::Client::new();
    let value = client::send_json(http.delete(format!("{}/projects/1", server.url())))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    assert!(value.is_null());
    Ok(())
}
