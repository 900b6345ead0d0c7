//! # Pagetrail Domain
//!
//! Shared types, constants and error definitions for the Pagetrail delivery
//! pipeline. This crate is dependency-light by design: no I/O, no async, just
//! the vocabulary the other layers speak.

pub mod constants;
pub mod errors;
pub mod types;

pub use errors::{PagetrailError, Result};
pub use types::{AuthSignal, FilterMode, PageVisit, SessionId, TokenSet};
