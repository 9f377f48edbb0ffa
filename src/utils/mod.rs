pub mod auth;
pub mod hex;
