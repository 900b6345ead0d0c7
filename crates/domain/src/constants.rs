//! Storage keys and fixed limits shared across the pipeline.
//!
//! Key names match what the original host persisted, so an existing state
//! store keeps working across upgrades.

/// State-store keys.
pub mod keys {
    /// Short-lived access credential
    pub const ACCESS_TOKEN: &str = "accessToken";
    /// Long-lived refresh credential
    pub const REFRESH_TOKEN: &str = "refreshToken";
    /// Filter interpretation mode ("blacklist" | "whitelist")
    pub const FILTER_MODE: &str = "filterMode";
    /// Master logging switch
    pub const LOGGING_ENABLED: &str = "isLoggingEnabled";
    /// URL filter pattern list
    pub const IGNORE_PATTERNS: &str = "ignorePatterns";
    /// Dwell-time batching switch
    pub const BATCH_MODE_ENABLED: &str = "intervalModeEnabled";
    /// Dwell threshold in seconds
    pub const DWELL_THRESHOLD_SECS: &str = "intervalThresholdSec";
    /// Persisted upload backlog
    pub const PENDING_UPLOADS: &str = "pendingUploads";
    /// Local CSV archive lines
    pub const CSV_LINES: &str = "localHistoryCsvLines";
}

/// Maximum number of undelivered visits kept in the upload queue. Oldest
/// entries are dropped first when the queue overflows.
pub const UPLOAD_QUEUE_CAPACITY: usize = 200;

/// Default dwell threshold applied when none is configured.
pub const DEFAULT_DWELL_THRESHOLD_SECS: u64 = 30;

/// Lower clamp for the configured dwell threshold.
pub const MIN_DWELL_THRESHOLD_SECS: u64 = 1;

/// Upper clamp for the configured dwell threshold (one day).
pub const MAX_DWELL_THRESHOLD_SECS: u64 = 86_400;

/// Maximum number of data rows retained in the CSV archive. The cap
/// deliberately counts data rows only, not the header line, so a full
/// archive holds 5 001 lines. Oldest rows are evicted first.
pub const CSV_MAX_LINES: usize = 5_000;

/// CSV archive column order.
pub const CSV_HEADER: &str = "timestamp,url,title,description,external_id";

/// Default URL patterns excluded in blacklist mode: google.com (subdomains
/// included) and localhost on any port.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"^https?://([a-z0-9-]+\.)?google\.com/.*",
    r"^https?://localhost(:\d+)?/.*",
];

/// Relative path of the token refresh endpoint. Called outside the
/// authenticated client to avoid recursive auth handling.
pub const REFRESH_PATH: &str = "/refresh";

/// Relative path of the collector ingestion endpoint.
pub const UPLOAD_PATH: &str = "/history";
