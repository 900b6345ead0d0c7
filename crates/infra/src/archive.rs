//! Local CSV archive
//!
//! Best-effort mirror of everything the pipeline tries to deliver, kept as
//! CSV lines in the state store so the user can export their history even
//! when the collector is unreachable. The archive is capped; when full,
//! the oldest entries after the header are dropped.

use std::sync::Arc;

use pagetrail_core::storage::{StateStore, StateStoreExt};
use pagetrail_domain::constants::{keys, CSV_HEADER, CSV_MAX_LINES};
use pagetrail_domain::{PageVisit, Result};
use serde_json::{json, Value};
use tracing::debug;

pub struct CsvArchive {
    store: Arc<dyn StateStore>,
}

impl CsvArchive {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Append one visit to the archive, inserting the header on first use
    /// and evicting the oldest rows once the cap is reached.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn append(&self, visit: &PageVisit) -> Result<()> {
        let mut lines = self.lines().await?;
        if lines.is_empty() {
            lines.push(CSV_HEADER.to_string());
        }
        lines.push(visit_row(visit));

        // Header plus at most CSV_MAX_LINES data rows, newest preserved.
        let data_rows = lines.len() - 1;
        if data_rows > CSV_MAX_LINES {
            let excess = data_rows - CSV_MAX_LINES;
            lines.drain(1..=excess);
            debug!(dropped = excess, "archive cap reached, oldest rows evicted");
        }

        self.persist(&lines).await
    }

    /// The whole archive as one CSV document. Empty string when nothing
    /// was ever archived.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn export(&self) -> Result<String> {
        Ok(self.lines().await?.join("\n"))
    }

    /// Drop the archive entirely.
    ///
    /// # Errors
    /// Returns storage errors from the backing store.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(&[keys::CSV_LINES]).await
    }

    async fn lines(&self) -> Result<Vec<String>> {
        let value = self.store.get_value(keys::CSV_LINES).await?;
        let lines = match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(line) => Some(line),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(lines)
    }

    async fn persist(&self, lines: &[String]) -> Result<()> {
        self.store.set_value(keys::CSV_LINES, json!(lines)).await
    }
}

fn visit_row(visit: &PageVisit) -> String {
    [
        escape_field(&visit.timestamp.to_rfc3339()),
        escape_field(&visit.url),
        escape_field(&visit.title),
        escape_field(&visit.description),
        escape_field(&visit.external_id),
    ]
    .join(",")
}

/// Quote a field when it contains a comma, quote, or newline; internal
/// quotes are doubled.
fn escape_field(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::storage::MemoryStateStore;

    fn visit(title: &str) -> PageVisit {
        PageVisit {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            url: "https://example.com".to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            external_id: "host-1".to_string(),
        }
    }

    fn archive() -> CsvArchive {
        CsvArchive::new(Arc::new(MemoryStateStore::new()))
    }

    #[test]
    fn plain_fields_pass_through() {
        assert_eq!(escape_field("hello"), "hello");
    }

    #[test]
    fn commas_and_newlines_force_quoting() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("line1\nline2"), "\"line1\nline2\"");
    }

    #[test]
    fn internal_quotes_are_doubled() {
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn first_append_inserts_the_header() {
        let archive = archive();
        archive.append(&visit("One")).await.unwrap();

        let export = archive.export().await.unwrap();
        let lines: Vec<&str> = export.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains("One"));
    }

    #[tokio::test]
    async fn subsequent_appends_share_the_header() {
        let archive = archive();
        archive.append(&visit("One")).await.unwrap();
        archive.append(&visit("Two")).await.unwrap();

        let export = archive.export().await.unwrap();
        assert_eq!(export.matches(CSV_HEADER).count(), 1);
        assert_eq!(export.lines().count(), 3);
    }

    #[tokio::test]
    async fn cap_evicts_oldest_rows_and_keeps_header() {
        let store = Arc::new(MemoryStateStore::new());
        let archive = CsvArchive::new(store.clone());

        // Preload a full archive directly, then append one more row.
        let mut lines = vec![CSV_HEADER.to_string()];
        for i in 0..CSV_MAX_LINES {
            lines.push(format!("t,u,row-{i},d,x"));
        }
        store.set_value(keys::CSV_LINES, json!(lines)).await.unwrap();

        archive.append(&visit("Newest")).await.unwrap();

        let export = archive.export().await.unwrap();
        let lines: Vec<&str> = export.lines().collect();
        assert_eq!(lines.len(), CSV_MAX_LINES + 1);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(!export.contains("row-0"));
        assert!(export.contains("row-1"));
        assert!(lines[lines.len() - 1].contains("Newest"));
    }

    #[tokio::test]
    async fn clear_empties_the_archive() {
        let archive = archive();
        archive.append(&visit("One")).await.unwrap();
        archive.clear().await.unwrap();
        assert_eq!(archive.export().await.unwrap(), "");
    }
}
