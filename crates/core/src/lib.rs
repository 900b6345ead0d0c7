//! # Pagetrail Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The session batcher state machine
//! - URL filtering and settings
//! - Port/adapter interfaces (traits)
//! - The tracking service tying them together
//!
//! ## Architecture Principles
//! - Only depends on `pagetrail-domain`
//! - No HTTP or filesystem code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod batch;
pub mod filter;
pub mod settings;
pub mod storage;
pub mod tracking;

// Re-export specific items to avoid ambiguity
pub use batch::SessionBatcher;
pub use filter::UrlFilter;
pub use settings::Settings;
pub use storage::StateStore;
pub use tracking::ports::{AuthNotifier, VisitSink};
pub use tracking::TrackingService;
