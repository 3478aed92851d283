//! Fixed test ids and secrets for deterministic tests.

use common::types::UserId;

// User ids
pub const TEST_USER_ID: UserId = UserId(42);
pub const TEST_USER_ALICE: UserId = UserId(100);

/// Signing secret used by the test server. At least 32 bytes.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-do-not-use-in-production";

/// A different, equally valid secret for forged-signature tests.
pub const WRONG_JWT_SECRET: &str = "another-secret-that-the-server-never-saw";

// Registration fixtures
pub const TEST_EMAIL: &str = "ada@example.com";
pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_FIRST_NAME: &str = "Ada";
pub const TEST_LAST_NAME: &str = "Lovelace";

/// Lowest cost bcrypt accepts; keeps password hashing fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;
