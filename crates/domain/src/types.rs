//! Core domain types for the delivery pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observed page visit, as accepted by the collector ingestion
/// endpoint. Field names follow the collector wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVisit {
    /// When the visit was observed
    pub timestamp: DateTime<Utc>,
    /// Page URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Page meta description (may be empty)
    #[serde(default)]
    pub description: String,
    /// Stable identifier of the reporting host
    pub external_id: String,
}

/// Credential set as persisted in the state store.
///
/// Presence of `access_token` implies a prior successful authentication or
/// refresh; both absent means the caller is unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    /// Short-lived credential attached to outbound requests
    pub access_token: Option<String>,
    /// Longer-lived credential exchanged for a new access token
    pub refresh_token: Option<String>,
}

impl TokenSet {
    /// True when at least one credential is present.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

/// URL filter interpretation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Patterns exclude matching URLs; everything else is logged
    Blacklist,
    /// Only URLs matching a pattern are logged; empty list logs nothing
    Whitelist,
}

impl Default for FilterMode {
    fn default() -> Self {
        Self::Blacklist
    }
}

/// Fire-and-forget notification signals toward the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// No credential has ever been present; the user must log in
    Required,
    /// Credentials were cleared after a failed refresh; re-authentication needed
    Invalid,
}

/// Identifier of a logical session (a browser tab in the original host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
