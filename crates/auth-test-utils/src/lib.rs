//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service.
//!
//! This crate provides:
//! - Deterministic fixtures (fixed signing secret, fast bcrypt settings)
//! - Server test harness (TestAuthServer for E2E tests)
//! - Fixed test IDs and credentials
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestAuthServer::spawn().await?;
//!     server.seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None).await?;
//!
//!     let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
//!     pair.access_token.assert_valid_jwt().assert_kind("access");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
