//! Current user endpoint.

use crate::errors::SessionError;
use crate::middleware::AuthenticatedUser;
use crate::models::{MeResponse, UserProfileResponse};
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /me
///
/// Returns the identity attached by the authentication gate, plus the
/// profile when the identity directory still knows the user.
///
/// ```json
/// {
///   "user_id": 42,
///   "user": { "id": 42, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com" }
/// }
/// ```
#[instrument(skip_all, name = "session.handlers.me")]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<MeResponse>, SessionError> {
    let profile = state.identity.find(user.0).await?;

    Ok(Json(MeResponse {
        user_id: user.0,
        user: profile.map(UserProfileResponse::from),
    }))
}
