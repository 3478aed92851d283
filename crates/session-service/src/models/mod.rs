use crate::services::UserProfile;
use common::secret::SecretString;
use common::types::UserId;
use serde::{Deserialize, Serialize};

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// Body returned by register and login. The refresh token travels in the
/// `refresh_token` cookie only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserProfileResponse,
    pub access_token: String,
    pub token_type: String,
    /// Absolute access token expiry (Unix epoch seconds).
    pub access_expires_at: i64,
}

/// Body returned by refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub access_expires_at: i64,
}

/// Public user fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserProfile> for UserProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
        }
    }
}

/// Body returned by `/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfileResponse>,
}

/// Body returned by `/ready`.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

pub const TOKEN_TYPE_BEARER: &str = "Bearer";
