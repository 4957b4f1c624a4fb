pub mod principals;
pub mod session_store;
