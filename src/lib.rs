#![warn(clippy::pedantic)]

//! Client for the Coderr freelance-marketplace API: account activation,
//! credential storage, password reset and normalized HTTP helpers.

pub mod activation;
pub mod api;
pub mod auth;
pub mod config;
pub mod fields;
pub mod form;
pub mod password_reset;
pub mod session;

pub use api::{ApiClient, FailureKind, Outcome};
pub use config::ClientConfig;
pub use session::{CredentialRecord, FileStore, KeyValueStore, MemoryStore, Session};
