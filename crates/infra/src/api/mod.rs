//! Authenticated collector API access

pub mod auth;
pub mod client;
pub mod errors;

pub use auth::CredentialManager;
pub use client::{ApiClient, ApiClientConfig};
pub use errors::{ApiError, ApiErrorCategory};
