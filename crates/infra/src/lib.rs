//! # Pagetrail Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - HTTP transport and the authenticated API client
//! - Credential management with single-flight refresh
//! - The durable upload queue and uploader
//! - State-store adapters (in-memory, JSON file)
//! - CSV archive and the notification hub
//!
//! ## Architecture
//! - Implements traits defined in `pagetrail-core`
//! - Depends on `pagetrail-domain` and `pagetrail-core`
//! - Contains all "impure" code (I/O, network)

pub mod api;
pub mod archive;
pub mod http;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod sync;

// Re-export commonly used items
pub use api::auth::CredentialManager;
pub use api::client::{ApiClient, ApiClientConfig};
pub use api::errors::ApiError;
pub use archive::CsvArchive;
pub use http::HttpClient;
pub use notify::NotificationHub;
pub use pipeline::DeliveryPipeline;
pub use storage::{JsonFileStore, MemoryStateStore};
pub use sync::queue::UploadQueue;
pub use sync::uploader::Uploader;
pub use sync::VisitForwarder;
