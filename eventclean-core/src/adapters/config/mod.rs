//! Configuration types for store adapters.
//!
//! # Security
//! `ConnectionConfig` intentionally does NOT store passwords. Credentials are
//! carried separately in [`crate::security::Credentials`] and only combined
//! with the connection parameters when the store URL is built.

mod connection;

pub use connection::{ConnectionConfig, DEFAULT_POSTGRES_PORT};
