//! URL filtering
//!
//! Decides whether a URL should be logged at all, based on the configured
//! pattern list and filter mode. A pattern that fails to compile is ignored
//! (treated as non-matching) with a warning; bad configuration must never
//! stop the pipeline.

use pagetrail_domain::FilterMode;
use regex::Regex;
use tracing::warn;

/// Compiled URL filter.
#[derive(Debug)]
pub struct UrlFilter {
    mode: FilterMode,
    patterns: Vec<Regex>,
}

impl UrlFilter {
    /// Compile a filter from raw pattern strings. Invalid patterns are
    /// dropped with a warning.
    #[must_use]
    pub fn compile(mode: FilterMode, raw_patterns: &[String]) -> Self {
        let patterns = raw_patterns
            .iter()
            .filter_map(|raw| match Regex::new(raw) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %raw, error = %err, "ignoring invalid filter pattern");
                    None
                }
            })
            .collect();

        Self { mode, patterns }
    }

    /// Whether a visit to `url` should be logged.
    #[must_use]
    pub fn should_log(&self, url: &str) -> bool {
        let matched = self.patterns.iter().any(|re| re.is_match(url));
        match self.mode {
            // Whitelist: only matching URLs are logged; an empty list logs
            // nothing.
            FilterMode::Whitelist => !self.patterns.is_empty() && matched,
            // Blacklist: matching URLs are excluded.
            FilterMode::Blacklist => !matched,
        }
    }

    /// Number of patterns that survived compilation.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}
