//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types
//! for every sensitive value the session service handles: the JWT signing
//! secret, user passwords, and issued access/refresh tokens.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so any
//! struct deriving `Debug` that holds a secret gets safe logging behavior for
//! free. Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     email: "alice@example.com".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! // Password is redacted
//! assert!(!format!("{req:?}").contains("hunter2"));
//!
//! // Access requires an explicit call
//! let password: &str = req.password.expose_secret();
//! assert_eq!(password, "hunter2");
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - User passwords
//! - Access and refresh tokens
//!
//! Use `SecretBox<T>` for:
//! - Binary key material (e.g., `SecretBox<Vec<u8>>` for the HMAC secret)

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
