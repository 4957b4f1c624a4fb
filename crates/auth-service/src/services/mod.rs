pub mod auth_service;
pub mod notification;
pub mod session_registry;
