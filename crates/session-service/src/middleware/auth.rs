//! Request authentication gate.
//!
//! Extracts the bearer token from the `Authorization` header, verifies it as
//! an access token and attaches the identity to the request's extensions.
//! The identity lives exactly as long as the request; nothing is kept in
//! process-wide state.

use crate::errors::SessionError;
use crate::services::TokenService;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use common::types::UserId;
use std::sync::Arc;
use tracing::{debug, instrument};

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Identity of the caller, inserted by [`require_session`].
///
/// Handlers read it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Extract the bearer token from the `Authorization` header.
///
/// # Errors
///
/// `MissingCredentials` when the header is absent, not valid UTF-8, not a
/// `Bearer` credential, or carries an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, SessionError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            debug!(target: "session.middleware.auth", "Missing Authorization header");
            SessionError::MissingCredentials
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| {
            debug!(target: "session.middleware.auth", "Invalid Authorization header format");
            SessionError::MissingCredentials
        })?;

    if token.is_empty() {
        debug!(target: "session.middleware.auth", "Empty bearer token");
        return Err(SessionError::MissingCredentials);
    }

    Ok(token)
}

/// Resolve the caller's identity from request headers.
///
/// # Errors
///
/// `MissingCredentials`, `AccessTokenExpired` or `AccessTokenInvalid`.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<UserId, SessionError> {
    let token = extract_bearer_token(headers)?;
    tokens.verify_access_token(token)
}

/// Authentication middleware for protected routes.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing, invalid or expired
/// - Continues to the next handler with [`AuthenticatedUser`] in extensions otherwise
#[instrument(skip_all, name = "session.middleware.auth")]
pub async fn require_session(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, SessionError> {
    let user_id = authenticate(req.headers(), &state.tokens)?;

    req.extensions_mut().insert(AuthenticatedUser(user_id));

    Ok(next.run(req).await)
}
