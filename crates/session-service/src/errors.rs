//! Session service error types.
//!
//! Every variant maps to an HTTP status and a stable error code via the
//! `IntoResponse` impl. Internal failures are logged server-side and reach
//! the client as a generic `INTERNAL_ERROR`.

use crate::codec::CodecError;
use crate::store::StoreError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Access token has expired")]
    AccessTokenExpired,

    #[error("Access token is invalid")]
    AccessTokenInvalid,

    #[error("Missing or malformed Authorization header")]
    MissingCredentials,

    #[error("Refresh token is invalid")]
    RenewalTokenInvalid,

    #[error("Refresh token has expired")]
    RenewalTokenExpired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Renewal store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable error code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::AccessTokenExpired => "ACCESS_TOKEN_EXPIRED",
            SessionError::AccessTokenInvalid => "INVALID_ACCESS_TOKEN",
            SessionError::MissingCredentials => "MISSING_CREDENTIALS",
            SessionError::RenewalTokenInvalid => "INVALID_REFRESH_TOKEN",
            SessionError::RenewalTokenExpired => "REFRESH_TOKEN_EXPIRED",
            SessionError::InvalidCredentials => "INVALID_CREDENTIALS",
            SessionError::BadRequest(_) => "BAD_REQUEST",
            SessionError::Conflict(_) => "CONFLICT",
            SessionError::Store(_) | SessionError::Crypto(_) | SessionError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::AccessTokenExpired
            | SessionError::AccessTokenInvalid
            | SessionError::MissingCredentials
            | SessionError::RenewalTokenInvalid
            | SessionError::RenewalTokenExpired
            | SessionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            SessionError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SessionError::Conflict(_) => StatusCode::CONFLICT,
            SessionError::Store(_) | SessionError::Crypto(_) | SessionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether this error is a server-side fault rather than a client error.
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            // Decode failures are classified by the token service; reaching
            // this conversion means a signing failure.
            CodecError::Signing(reason) => SessionError::Crypto(reason),
            CodecError::MalformedOrForged => SessionError::AccessTokenInvalid,
            CodecError::Expired => SessionError::AccessTokenExpired,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            SessionError::Store(err) => {
                tracing::error!(target: "session.errors", error = %err, "Renewal store failure");
                "An internal error occurred".to_string()
            }
            SessionError::Crypto(err) => {
                tracing::error!(target: "session.errors", error = %err, "Cryptographic failure");
                "An internal error occurred".to_string()
            }
            SessionError::Internal(err) => {
                tracing::error!(target: "session.errors", error = %err, "Internal failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                SessionError::MissingCredentials | SessionError::InvalidCredentials => {
                    "Bearer realm=\"session\""
                }
                _ => "Bearer realm=\"session\", error=\"invalid_token\"",
            };
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
