//! Event intake and orchestration

pub mod ports;
mod service;

pub use service::TrackingService;
