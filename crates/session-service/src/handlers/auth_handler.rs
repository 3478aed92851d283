//! Session handlers: register, login, refresh and logout.
//!
//! Access tokens travel in the JSON body. Refresh tokens only ever travel in
//! the `refresh_token` cookie.

use crate::errors::SessionError;
use crate::handlers::cookies::{
    build_clear_cookie, build_set_cookie, get_cookie, to_header_value, REFRESH_COOKIE_NAME,
};
use crate::models::{
    LoginRequest, RefreshResponse, SessionResponse, UserProfileResponse, TOKEN_TYPE_BEARER,
};
use crate::observability::metrics::{record_login, record_registration};
use crate::routes::AppState;
use crate::services::{NewUser, TokenPair, UserProfile};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Handle user registration.
///
/// POST /auth/register
///
/// Returns 201 with the new profile and an access token. The refresh token is
/// set as a cookie.
#[instrument(skip_all, name = "session.handlers.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewUser>,
) -> Result<Response, SessionError> {
    let result = register_and_issue(&state, payload).await;
    record_registration(identity_status(&result));

    let (profile, pair) = result?;
    info!(target: "session.handlers.auth", user_id = %profile.id, "Session opened after registration");

    session_response(&state, StatusCode::CREATED, profile, pair)
}

async fn register_and_issue(
    state: &AppState,
    payload: NewUser,
) -> Result<(UserProfile, TokenPair), SessionError> {
    let profile = state.identity.register(payload).await?;
    let pair = state.tokens.issue_token_pair(profile.id).await?;
    Ok((profile, pair))
}

/// Handle login.
///
/// POST /auth/login
///
/// Unknown email and wrong password both answer 401 `INVALID_CREDENTIALS`.
#[instrument(skip_all, name = "session.handlers.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, SessionError> {
    let result = login_and_issue(&state, payload).await;
    record_login(identity_status(&result));

    let (profile, pair) = result?;
    info!(target: "session.handlers.auth", user_id = %profile.id, "Session opened after login");

    session_response(&state, StatusCode::OK, profile, pair)
}

async fn login_and_issue(
    state: &AppState,
    payload: LoginRequest,
) -> Result<(UserProfile, TokenPair), SessionError> {
    let profile = state
        .identity
        .authenticate(&payload.email, &payload.password)
        .await?;
    let pair = state.tokens.issue_token_pair(profile.id).await?;
    Ok((profile, pair))
}

/// Handle refresh token rotation.
///
/// POST /auth/refresh
///
/// Consumes the refresh token from the cookie and answers with a new access
/// token plus a rotated refresh cookie. A missing cookie is treated as an
/// invalid refresh token.
#[instrument(skip_all, name = "session.handlers.refresh")]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, SessionError> {
    let renewal_token = get_cookie(&headers, REFRESH_COOKIE_NAME).ok_or_else(|| {
        debug!(target: "session.handlers.auth", "Refresh request without refresh cookie");
        SessionError::RenewalTokenInvalid
    })?;

    let pair = state.tokens.rotate_tokens(renewal_token).await?;

    let body = RefreshResponse {
        access_token: pair.access_token.expose_secret().to_string(),
        token_type: TOKEN_TYPE_BEARER.to_string(),
        access_expires_at: pair.access_expires_at,
    };
    let cookie = build_set_cookie(
        pair.renewal_token.expose_secret(),
        state.tokens.renewal_ttl(),
        state.secure_cookies,
    );

    with_cookie(Json(body).into_response(), &cookie)
}

/// Handle logout.
///
/// POST /auth/logout
///
/// Always answers 204 and clears the cookie. The refresh token's store entry
/// is revoked when one is presented; store failures are logged, not returned.
#[instrument(skip_all, name = "session.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, SessionError> {
    if let Some(renewal_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        match state.tokens.revoke_renewal_token(renewal_token).await {
            Ok(revoked) => {
                debug!(target: "session.handlers.auth", revoked, "Logout processed");
            }
            Err(e) => {
                warn!(target: "session.handlers.auth", error = %e, "Refresh token revocation failed during logout");
            }
        }
    }

    with_cookie(
        StatusCode::NO_CONTENT.into_response(),
        &build_clear_cookie(state.secure_cookies),
    )
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    profile: UserProfile,
    pair: TokenPair,
) -> Result<Response, SessionError> {
    let body = SessionResponse {
        user: UserProfileResponse::from(profile),
        access_token: pair.access_token.expose_secret().to_string(),
        token_type: TOKEN_TYPE_BEARER.to_string(),
        access_expires_at: pair.access_expires_at,
    };
    let cookie = build_set_cookie(
        pair.renewal_token.expose_secret(),
        state.tokens.renewal_ttl(),
        state.secure_cookies,
    );

    with_cookie((status, Json(body)).into_response(), &cookie)
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, SessionError> {
    let value = to_header_value(cookie).ok_or_else(|| {
        SessionError::Internal("refresh cookie is not a valid header value".to_string())
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

/// Metric label for a login or registration attempt.
fn identity_status<T>(result: &Result<T, SessionError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.is_internal() => "error",
        Err(_) => "rejected",
    }
}
