//! Identity collaborator: registers users and checks their passwords.
//!
//! The token service only needs a stable [`UserId`] from here. Passwords are
//! hashed with bcrypt and the hashes never leave the directory.

use crate::errors::SessionError;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, instrument};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt truncates input beyond 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

const MAX_NAME_LENGTH: usize = 100;

/// Hashed at startup and verified against when the email is unknown.
const DUMMY_PASSWORD: &str = "unknown-account-placeholder";

/// Public view of a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Registration input.
#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Create a user.
    ///
    /// # Errors
    ///
    /// - `BadRequest` - empty names, invalid email or weak password
    /// - `Conflict` - email already registered
    async fn register(&self, new_user: NewUser) -> Result<UserProfile, SessionError>;

    /// Check an email/password pair.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown email and for a wrong password alike.
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserProfile, SessionError>;

    /// Look up a user by id.
    async fn find(&self, id: UserId) -> Result<Option<UserProfile>, SessionError>;
}

struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

/// Process-local user directory with bcrypt password hashes.
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, StoredUser>>,
    next_id: AtomicI64,
    bcrypt_cost: u32,
    // Same cost as real hashes, so both login failure paths take equally long
    dummy_hash: String,
}

impl InMemoryUserDirectory {
    /// Create an empty directory hashing at `bcrypt_cost`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` if bcrypt rejects the cost.
    pub fn new(bcrypt_cost: u32) -> Result<Self, SessionError> {
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, bcrypt_cost)
            .map_err(|e| SessionError::Crypto(format!("Password hashing failed: {e}")))?;

        Ok(Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            bcrypt_cost,
            dummy_hash,
        })
    }

    fn poisoned() -> SessionError {
        SessionError::Internal("user directory lock poisoned".to_string())
    }
}

#[async_trait]
impl IdentityVerifier for InMemoryUserDirectory {
    #[instrument(skip_all)]
    async fn register(&self, new_user: NewUser) -> Result<UserProfile, SessionError> {
        let first_name = validate_name("first_name", &new_user.first_name)?;
        let last_name = validate_name("last_name", &new_user.last_name)?;
        let email = normalize_email(&new_user.email);
        if !is_valid_email(&email) {
            return Err(SessionError::BadRequest("Invalid email format".to_string()));
        }
        validate_password(&new_user.password)?;

        // Cheap duplicate check before paying for bcrypt
        {
            let users = self.users.read().map_err(|_| Self::poisoned())?;
            if users.contains_key(&email) {
                return Err(SessionError::Conflict(
                    "Email already registered".to_string(),
                ));
            }
        }

        let password_hash = bcrypt::hash(new_user.password.expose_secret(), self.bcrypt_cost)
            .map_err(|e| SessionError::Crypto(format!("Password hashing failed: {e}")))?;

        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        // Re-check under the write lock; a concurrent registration may have won
        if users.contains_key(&email) {
            return Err(SessionError::Conflict(
                "Email already registered".to_string(),
            ));
        }

        let profile = UserProfile {
            id: UserId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            first_name,
            last_name,
            email: email.clone(),
        };
        users.insert(
            email,
            StoredUser {
                profile: profile.clone(),
                password_hash,
            },
        );

        info!(target: "session.identity", user_id = %profile.id, "User registered");
        Ok(profile)
    }

    #[instrument(skip_all)]
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserProfile, SessionError> {
        let email = normalize_email(email);

        let (hash, profile) = {
            let users = self.users.read().map_err(|_| Self::poisoned())?;
            match users.get(&email) {
                Some(user) => (user.password_hash.clone(), Some(user.profile.clone())),
                None => (self.dummy_hash.clone(), None),
            }
        };

        // Always run bcrypt, even for unknown emails
        let is_valid = bcrypt::verify(password.expose_secret(), &hash).unwrap_or(false);

        match profile {
            Some(profile) if is_valid => Ok(profile),
            _ => {
                debug!(target: "session.identity", "Authentication failed");
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    async fn find(&self, id: UserId) -> Result<Option<UserProfile>, SessionError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users
            .values()
            .find(|u| u.profile.id == id)
            .map(|u| u.profile.clone()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(field: &str, value: &str) -> Result<String, SessionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::BadRequest(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(SessionError::BadRequest(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_password(password: &SecretString) -> Result<(), SessionError> {
    let len = password.expose_secret().len();
    if len < MIN_PASSWORD_LENGTH {
        return Err(SessionError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_BYTES {
        return Err(SessionError::BadRequest(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Basic shape check: one `@`, non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty())
}
