//! Auth Service Library
//!
//! Issues, verifies and revokes session tokens for the task manager,
//! registers accounts, and drives password change and OTP-based password
//! recovery.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Password hashing, OTP generation and the token codec
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer token authentication
//! - `models` - Data models
//! - `observability` - Metrics and log correlation helpers
//! - `repositories` - Principal directory and session store access
//! - `routes` - Router assembly
//! - `services` - Session registry and auth workflows

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
