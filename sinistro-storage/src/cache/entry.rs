//! Cache entry layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata stored next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// When the payload was captured from its source.
    pub captured_at: DateTime<Utc>,
    /// Format version of the build that wrote the entry.
    pub format_version: String,
    /// Number of records in the payload.
    pub item_count: usize,
}

impl CacheMetadata {
    pub fn new(captured_at: DateTime<Utc>, format_version: impl Into<String>, item_count: usize) -> Self {
        Self {
            captured_at,
            format_version: format_version.into(),
            item_count,
        }
    }

    /// Metadata stamped with the current time.
    pub fn now(format_version: impl Into<String>, item_count: usize) -> Self {
        Self::new(Utc::now(), format_version, item_count)
    }

    /// Age of the entry at `now`. Entries captured in the future are age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// A cached payload with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub metadata: CacheMetadata,
}

/// Metadata-only view of a stored entry, decoded before the payload so a
/// stale format can be rejected without understanding its payload.
#[derive(Debug, Deserialize)]
pub(crate) struct EntryHeader {
    pub metadata: CacheMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn age_is_measured_from_capture() {
        let now = Utc::now();
        let meta = CacheMetadata::new(now - ChronoDuration::hours(2), "2", 1);
        assert_eq!(meta.age_at(now), Duration::from_secs(2 * 3600));
    }

    #[test]
    fn future_capture_has_zero_age() {
        let now = Utc::now();
        let meta = CacheMetadata::new(now + ChronoDuration::minutes(5), "2", 1);
        assert_eq!(meta.age_at(now), Duration::ZERO);
    }

    #[test]
    fn header_ignores_payload() {
        let raw = r#"{"key":"k","payload":{"anything":[1,2,3]},"metadata":{"capturedAt":"2026-01-01T00:00:00Z","formatVersion":"1","itemCount":3}}"#;
        let header: EntryHeader = serde_json::from_str(raw).unwrap();
        assert_eq!(header.metadata.format_version, "1");
        assert_eq!(header.metadata.item_count, 3);
    }
}
