//! Fixed test IDs for deterministic tests
//!
//! Using fixed UUIDs and credentials prevents flaky tests caused by random data.

use uuid::Uuid;

// Principal IDs (100-199)
pub const TEST_USER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_USER_BOB: Uuid = Uuid::from_u128(101);
pub const TEST_USER_CHARLIE: Uuid = Uuid::from_u128(102);

// Emails
pub const TEST_EMAIL_ALICE: &str = "alice@example.com";
pub const TEST_EMAIL_BOB: &str = "bob@example.com";
pub const TEST_EMAIL_CHARLIE: &str = "charlie@example.com";
pub const TEST_EMAIL_UNKNOWN: &str = "nobody@example.com";

// Passwords
pub const TEST_PASSWORD: &str = "correct-horse-battery-staple";
pub const TEST_PASSWORD_NEW: &str = "tr0ub4dor-and-3";

// Roles
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_USER: &str = "user";
