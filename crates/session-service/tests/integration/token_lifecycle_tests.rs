//! Token lifecycle tests against the token service.
//!
//! Issue, verify, rotate and revoke through the public API, with forged
//! tokens from `TestTokenBuilder` for the cases the service never produces.

use common::secret::{ExposeSecret, SecretBox};
use common::types::UserId;
use session_service::clock::Clock;
use session_service::codec::TokenCodec;
use session_service::errors::SessionError;
use session_service::services::TokenService;
use session_service::store::InMemoryRenewalStore;
use session_test_utils::{
    MockClock, TestSessionServer, TestTokenBuilder, TokenAssertions, TEST_JWT_SECRET,
    TEST_USER_ALICE, TEST_USER_ID, WRONG_JWT_SECRET,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Issue and verify
// ============================================================================

#[tokio::test]
async fn test_issued_pair_has_expected_shape() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    let access_ttl = server.config().access_token_ttl.as_secs() as i64;
    let renewal_ttl = server.config().refresh_token_ttl.as_secs() as i64;

    pair.access_token
        .expose_secret()
        .assert_valid_jwt()
        .assert_for_user(TEST_USER_ID)
        .assert_is_access_token()
        .assert_lifetime(access_ttl)
        .assert_expires_at(pair.access_expires_at);

    pair.renewal_token
        .expose_secret()
        .assert_valid_jwt()
        .assert_for_user(TEST_USER_ID)
        .assert_is_refresh_token()
        .assert_lifetime(renewal_ttl)
        .assert_expires_at(pair.renewal_expires_at);

    Ok(())
}

#[tokio::test]
async fn test_identity_42_scenario() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let tokens = server.tokens();

    let pair = server.issue_tokens_for(UserId(42)).await?;
    assert_eq!(
        tokens.verify_access_token(pair.access_token.expose_secret())?,
        UserId(42)
    );

    let rotated = tokens
        .rotate_tokens(pair.renewal_token.expose_secret())
        .await?;
    assert_eq!(rotated.user_id, UserId(42));

    let replay = tokens
        .rotate_tokens(pair.renewal_token.expose_secret())
        .await;
    assert!(
        matches!(replay, Err(SessionError::RenewalTokenInvalid)),
        "Replayed refresh token must be rejected, got {replay:?}"
    );

    let again = tokens
        .rotate_tokens(rotated.renewal_token.expose_secret())
        .await?;
    assert_eq!(
        tokens.verify_access_token(again.access_token.expose_secret())?,
        UserId(42)
    );

    Ok(())
}

#[tokio::test]
async fn test_forged_tokens_are_invalid() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let tokens = server.tokens();
    let now = server.clock().now();

    let forged = [
        (
            "wrong secret",
            TestTokenBuilder::at(now).signed_with(WRONG_JWT_SECRET).sign(),
        ),
        (
            "HS512",
            TestTokenBuilder::at(now)
                .with_algorithm(jsonwebtoken::Algorithm::HS512)
                .sign(),
        ),
        ("alg none", TestTokenBuilder::at(now).unsigned()),
        (
            "missing uid",
            TestTokenBuilder::at(now).without_user().sign(),
        ),
        (
            "missing exp",
            TestTokenBuilder::at(now).without_expiry().sign(),
        ),
        (
            "missing iat",
            TestTokenBuilder::at(now).without_issued_at().sign(),
        ),
        (
            "iat far in the future",
            TestTokenBuilder::at(now + 3600).sign(),
        ),
        ("not a token", "definitely-not-a-jwt".to_string()),
    ];

    for (case, token) in forged {
        let result = tokens.verify_access_token(&token);
        assert!(
            matches!(result, Err(SessionError::AccessTokenInvalid)),
            "{case}: expected AccessTokenInvalid, got {result:?}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_correctly_signed_foreign_token_verifies() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let token = TestTokenBuilder::at(server.clock().now())
        .for_user(TEST_USER_ALICE)
        .signed_with(TEST_JWT_SECRET)
        .sign();

    assert_eq!(server.tokens().verify_access_token(&token)?, TEST_USER_ALICE);
    Ok(())
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn test_access_token_expires_after_ttl() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    server
        .clock()
        .advance(server.config().access_token_ttl - Duration::from_secs(1));
    assert!(server
        .tokens()
        .verify_access_token(pair.access_token.expose_secret())
        .is_ok());

    server.clock().advance(Duration::from_secs(1));
    let result = server
        .tokens()
        .verify_access_token(pair.access_token.expose_secret());
    assert!(
        matches!(result, Err(SessionError::AccessTokenExpired)),
        "got {result:?}"
    );

    Ok(())
}

#[tokio::test]
async fn test_refresh_token_expires_after_ttl() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    server.clock().advance(server.config().refresh_token_ttl);

    let result = server
        .tokens()
        .rotate_tokens(pair.renewal_token.expose_secret())
        .await;
    assert!(
        matches!(
            result,
            Err(SessionError::RenewalTokenExpired) | Err(SessionError::RenewalTokenInvalid)
        ),
        "got {result:?}"
    );

    Ok(())
}

#[tokio::test]
async fn test_forged_expired_refresh_token_is_expired() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let now = server.clock().now();
    let token = TestTokenBuilder::at(now - 120)
        .as_refresh_token("some-rotation-id")
        .expires_in(60)
        .sign();

    let result = server.tokens().rotate_tokens(&token).await;
    assert!(
        matches!(result, Err(SessionError::RenewalTokenExpired)),
        "got {result:?}"
    );

    Ok(())
}

// ============================================================================
// Rotation
// ============================================================================

#[tokio::test]
async fn test_access_token_cannot_be_rotated() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    let result = server
        .tokens()
        .rotate_tokens(pair.access_token.expose_secret())
        .await;
    assert!(
        matches!(result, Err(SessionError::RenewalTokenInvalid)),
        "got {result:?}"
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_rotation_id_is_invalid() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let token = TestTokenBuilder::at(server.clock().now())
        .as_refresh_token("never-issued")
        .expires_in(3600)
        .sign();

    let result = server.tokens().rotate_tokens(&token).await;
    assert!(
        matches!(result, Err(SessionError::RenewalTokenInvalid)),
        "got {result:?}"
    );

    Ok(())
}

#[tokio::test]
async fn test_rotation_replaces_store_entry() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;
    assert_eq!(server.store().live_entries()?, 1);

    let rotated = server
        .tokens()
        .rotate_tokens(pair.renewal_token.expose_secret())
        .await?;

    assert_eq!(server.store().live_entries()?, 1);
    assert_ne!(
        pair.renewal_token.expose_secret(),
        rotated.renewal_token.expose_secret()
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotations_yield_exactly_one_success() -> Result<(), anyhow::Error> {
    let clock = Arc::new(MockClock::starting_now());
    let secret = SecretBox::new(Box::new(TEST_JWT_SECRET.as_bytes().to_vec()));
    let codec = TokenCodec::new(&secret, clock.clone(), Duration::from_secs(300));
    let store = Arc::new(InMemoryRenewalStore::new(clock));
    let tokens = Arc::new(TokenService::new(
        codec,
        store,
        Duration::from_secs(900),
        Duration::from_secs(3600),
    ));

    let pair = tokens.issue_token_pair(TEST_USER_ID).await?;
    let renewal = pair.renewal_token.expose_secret().to_string();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let tokens = tokens.clone();
        let renewal = renewal.clone();
        handles.push(tokio::spawn(
            async move { tokens.rotate_tokens(&renewal).await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(SessionError::RenewalTokenInvalid) => {}
            Err(other) => anyhow::bail!("unexpected rotation error: {other:?}"),
        }
    }

    assert_eq!(successes, 1, "exactly one concurrent rotation must win");
    Ok(())
}

// ============================================================================
// Revocation
// ============================================================================

#[tokio::test]
async fn test_revoked_refresh_token_cannot_rotate() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    let pair = server.issue_tokens_for(TEST_USER_ID).await?;

    assert!(
        server
            .tokens()
            .revoke_renewal_token(pair.renewal_token.expose_secret())
            .await?
    );
    assert_eq!(server.store().live_entries()?, 0);

    let result = server
        .tokens()
        .rotate_tokens(pair.renewal_token.expose_secret())
        .await;
    assert!(
        matches!(result, Err(SessionError::RenewalTokenInvalid)),
        "got {result:?}"
    );

    // Access tokens stay valid until they expire
    assert!(server
        .tokens()
        .verify_access_token(pair.access_token.expose_secret())
        .is_ok());

    Ok(())
}

#[tokio::test]
async fn test_revoking_garbage_is_a_no_op() -> Result<(), anyhow::Error> {
    let server = TestSessionServer::spawn().await?;
    server.issue_tokens_for(TEST_USER_ID).await?;

    assert!(!server.tokens().revoke_renewal_token("garbage").await?);
    assert_eq!(server.store().live_entries()?, 1);

    Ok(())
}
