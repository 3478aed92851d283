//! # Session Test Utilities
//!
//! Shared test utilities for the session service.
//!
//! This crate provides:
//! - Token forging (`TestTokenBuilder`) for claims the service would never issue
//! - Server test harness (`TestSessionServer`) backed by the in-memory store
//! - Fixed test ids and secrets
//! - Custom assertions (`TokenAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestSessionServer::spawn().await?;
//!     let pair = server.issue_tokens_for(TEST_USER_ID).await?;
//!
//!     pair.access_token.expose_secret()
//!         .assert_valid_jwt()
//!         .assert_for_user(TEST_USER_ID)
//!         .assert_is_access_token();
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

pub use assertions::*;
pub use server_harness::*;
pub use session_service::clock::MockClock;
pub use test_ids::*;
pub use token_builders::*;
