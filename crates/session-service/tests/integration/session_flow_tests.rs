//! E2E tests for the HTTP session flow.
//!
//! Register, login, refresh and logout over real HTTP against the test
//! harness. The refresh cookie is carried by hand so each test controls
//! exactly which token is presented.
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use session_test_utils::{
    refresh_cookie_from, refresh_set_cookie_header, TestSessionServer, TokenAssertions,
    TEST_EMAIL, TEST_FIRST_NAME, TEST_LAST_NAME, TEST_PASSWORD,
};

fn registration_body() -> Value {
    json!({
        "first_name": TEST_FIRST_NAME,
        "last_name": TEST_LAST_NAME,
        "email": TEST_EMAIL,
        "password": TEST_PASSWORD,
    })
}

async fn register(
    server: &TestSessionServer,
    client: &reqwest::Client,
) -> Result<(Value, String), anyhow::Error> {
    let response = client
        .post(format!("{}/auth/register", server.url()))
        .json(&registration_body())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = refresh_cookie_from(response.headers())
        .ok_or_else(|| anyhow::anyhow!("registration did not set a refresh cookie"))?;
    let body: Value = response.json().await?;
    Ok((body, cookie))
}

async fn refresh(
    server: &TestSessionServer,
    client: &reqwest::Client,
    cookie: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(client
        .post(format!("{}/auth/refresh", server.url()))
        .header(COOKIE, format!("refresh_token={cookie}"))
        .send()
        .await?)
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_happy_path() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/register", server.url()))
        .json(&registration_body())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);

    let set_cookie = refresh_set_cookie_header(response.headers())
        .ok_or_else(|| anyhow::anyhow!("missing refresh cookie"))?;
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/auth"));
    assert!(set_cookie.contains("Max-Age=604800"));
    assert!(
        !set_cookie.contains("Secure"),
        "Development cookies are not Secure"
    );

    let body: Value = response.json().await?;
    assert_eq!(body["user"]["id"], 1);
    assert_eq!(body["user"]["email"], TEST_EMAIL);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body.get("refresh_token").is_none());
    assert!(
        body.get("password").is_none() && body["user"].get("password").is_none(),
        "Password must never be echoed"
    );

    body["access_token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("missing access_token"))?
        .assert_valid_jwt()
        .assert_is_access_token();

    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();
    register(&server, &client).await?;

    let response = client
        .post(format!("{}/auth/register", server.url()))
        .json(&registration_body())
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");

    Ok(())
}

#[tokio::test]
async fn test_register_weak_password_bad_request() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/register", server.url()))
        .json(&json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "weak@example.com",
            "password": "short",
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    Ok(())
}

#[tokio::test]
async fn test_production_cookie_is_secure() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn_with_vars(&[("APP_ENV", "production")]).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/register", server.url()))
        .json(&registration_body())
        .send()
        .await?;

    let set_cookie = refresh_set_cookie_header(response.headers())
        .ok_or_else(|| anyhow::anyhow!("missing refresh cookie"))?;
    assert!(set_cookie.contains("Secure"));

    Ok(())
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_happy_path() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();
    register(&server, &client).await?;

    let response = client
        .post(format!("{}/auth/login", server.url()))
        .json(&json!({"email": TEST_EMAIL, "password": TEST_PASSWORD}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_cookie_from(response.headers()).is_some());

    let body: Value = response.json().await?;
    assert_eq!(body["user"]["email"], TEST_EMAIL);
    assert!(body["access_token"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email_match() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();
    register(&server, &client).await?;

    let wrong_password = client
        .post(format!("{}/auth/login", server.url()))
        .json(&json!({"email": TEST_EMAIL, "password": "not-the-password"}))
        .send()
        .await?;
    let unknown_email = client
        .post(format!("{}/auth/login", server.url()))
        .json(&json!({"email": "nobody@example.com", "password": TEST_PASSWORD}))
        .send()
        .await?;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(refresh_cookie_from(wrong_password.headers()).is_none());

    let a: Value = wrong_password.json().await?;
    let b: Value = unknown_email.json().await?;
    assert_eq!(a["error"]["code"], "INVALID_CREDENTIALS");
    assert_eq!(a, b, "Failure responses must not reveal which part was wrong");

    Ok(())
}

// ============================================================================
// Full flow
// ============================================================================

/// register → /me → refresh → replayed cookie 401 → logout → refresh 401
#[tokio::test]
async fn test_full_session_flow() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();

    // Register
    let (body, first_cookie) = register(&server, &client).await?;
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("missing access_token"))?
        .to_string();

    // /me with the bearer token
    let me = client
        .get(format!("{}/me", server.url()))
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .send()
        .await?;
    assert_eq!(me.status(), StatusCode::OK);
    let me_body: Value = me.json().await?;
    assert_eq!(me_body["user_id"], 1);
    assert_eq!(me_body["user"]["email"], TEST_EMAIL);

    // Refresh with the cookie
    let refreshed = refresh(&server, &client, &first_cookie).await?;
    assert_eq!(refreshed.status(), StatusCode::OK);
    let second_cookie = refresh_cookie_from(refreshed.headers())
        .ok_or_else(|| anyhow::anyhow!("refresh did not rotate the cookie"))?;
    assert_ne!(first_cookie, second_cookie);
    let refreshed_body: Value = refreshed.json().await?;
    assert!(refreshed_body["access_token"].is_string());
    assert!(refreshed_body.get("refresh_token").is_none());

    // Replaying the first cookie fails
    let replay = refresh(&server, &client, &first_cookie).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let replay_body: Value = replay.json().await?;
    assert_eq!(replay_body["error"]["code"], "INVALID_REFRESH_TOKEN");

    // Logout clears the cookie and revokes it server-side
    let logout = client
        .post(format!("{}/auth/logout", server.url()))
        .header(COOKIE, format!("refresh_token={second_cookie}"))
        .send()
        .await?;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    let cleared = refresh_set_cookie_header(logout.headers())
        .ok_or_else(|| anyhow::anyhow!("logout did not clear the cookie"))?;
    assert!(cleared.starts_with("refresh_token=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(server.store().live_entries()?, 0);

    // The logged-out cookie no longer refreshes
    let after_logout = refresh(&server, &client, &second_cookie).await?;
    assert_eq!(after_logout.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

// ============================================================================
// Refresh and logout edge cases
// ============================================================================

#[tokio::test]
async fn test_refresh_without_cookie_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/refresh", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_REFRESH_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_refresh_with_access_token_cookie_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();
    let (body, _cookie) = register(&server, &client).await?;
    let access_token = body["access_token"].as_str().unwrap_or_default();

    let response = refresh(&server, &client, access_token).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_refresh_after_expiry_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();
    let (_body, cookie) = register(&server, &client).await?;

    server.clock().advance(server.config().refresh_token_ttl);

    let response = refresh(&server, &client, &cookie).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "REFRESH_TOKEN_EXPIRED");

    Ok(())
}

#[tokio::test]
async fn test_logout_without_cookie_no_content() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/logout", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        refresh_cookie_from(response.headers()).as_deref(),
        Some(""),
        "Logout always clears the cookie"
    );

    Ok(())
}
