//! Utilities and types shared across the task manager services.

#![warn(clippy::pedantic)]

/// Module for shared configuration sections
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
