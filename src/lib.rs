//! Jotter: a self-hosted notes service.
//!
//! One binary, SQLite inside. Accounts authenticate with PBKDF2-hashed
//! passwords and short-lived HS256 bearer tokens; every note operation
//! is scoped to the token's owner.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
