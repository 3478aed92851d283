//! Integration tests for the request authentication gate on `/me`.

use common::secret::ExposeSecret;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;
use session_service::clock::Clock;
use session_test_utils::{
    TestSessionServer, TestTokenBuilder, TEST_USER_ALICE, TEST_USER_ID, WRONG_JWT_SECRET,
};
use std::time::Duration;

async fn get_me(
    server: &TestSessionServer,
    authorization: Option<&str>,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let mut request = reqwest::Client::new().get(format!("{}/me", server.url()));
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }
    let response = request.send().await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn test_me_returns_identity_from_access_token() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    let (status, body) = get_me(
        &server,
        Some(&format!("Bearer {}", pair.access_token.expose_secret())),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 42);
    // Issued directly, so the directory has no profile for this id
    assert!(body.get("user").is_none());

    Ok(())
}

#[tokio::test]
async fn test_me_without_header_missing_credentials() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;

    let (status, body) = get_me(&server, None).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_me_with_malformed_header_missing_credentials() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;

    for value in ["Basic dXNlcjpwYXNz", "Bearer", "Token abc"] {
        let (status, body) = get_me(&server, Some(value)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {value:?}");
        assert_eq!(body["error"]["code"], "MISSING_CREDENTIALS", "header {value:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_me_with_refresh_token_rejected() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    let (status, body) = get_me(
        &server,
        Some(&format!("Bearer {}", pair.renewal_token.expose_secret())),
    )
    .await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_ACCESS_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_me_with_expired_token_rejected() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    server
        .clock()
        .advance(server.config().access_token_ttl + Duration::from_secs(1));

    let (status, body) = get_me(
        &server,
        Some(&format!("Bearer {}", pair.access_token.expose_secret())),
    )
    .await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "ACCESS_TOKEN_EXPIRED");
    Ok(())
}

#[tokio::test]
async fn test_me_with_forged_signature_rejected() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let token = TestTokenBuilder::at(server.clock().now())
        .for_user(TEST_USER_ALICE)
        .signed_with(WRONG_JWT_SECRET)
        .sign();

    let (status, body) = get_me(&server, Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_ACCESS_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_identity_does_not_leak_between_requests() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let alice = server.issue_tokens_for(TEST_USER_ALICE).await?;

    let (status, _) = get_me(
        &server,
        Some(&format!("Bearer {}", alice.access_token.expose_secret())),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_me(&server, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_CREDENTIALS");
    Ok(())
}
