//! Secret types for passwords, signing keys and issued tokens.
//!
//! Re-exports [`secrecy`] so every service uses the same wrappers. A struct
//! that derives `Debug` and holds a [`SecretString`] prints `[REDACTED]`
//! instead of the value, which keeps request bodies safe to trace.
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
//!     email: "ana@example.com".to_string(),
//!     password: SecretString::from("correct horse"),
//! };
//!
//! assert!(!format!("{req:?}").contains("correct horse"));
//! assert_eq!(req.password.expose_secret(), "correct horse");
//! ```
//!
//! Use `SecretString` for user passwords, OTP codes in transit and bearer
//! tokens. Use `SecretBox<Vec<u8>>` for raw key material such as the HMAC
//! signing secret.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
