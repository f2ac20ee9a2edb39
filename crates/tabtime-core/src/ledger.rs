//! The per-site time ledger.
//!
//! Pure in-memory data structure; persistence and locking live in the
//! daemon's `LedgerStore`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::site::SiteKey;

// ============================================================================
// Ledger Entry
// ============================================================================

/// Accumulated, not yet synced time for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Most recently observed page title for the site.
    pub display_title: String,
    pub accumulated_seconds: u64,
}

impl LedgerEntry {
    pub fn new(display_title: impl Into<String>, accumulated_seconds: u64) -> Self {
        Self {
            display_title: display_title.into(),
            accumulated_seconds,
        }
    }
}

/// A site whose total the backend has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedSite {
    pub key: SiteKey,
    /// The total that was sent, which may be lower than the current total.
    pub seconds: u64,
}

/// What a settle pass did to the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleSummary {
    /// Entries removed outright.
    pub removed: usize,
    /// Entries that grew during the round and were reduced to the unsent part.
    pub carried_over: usize,
}

// ============================================================================
// Ledger
// ============================================================================

/// Site key → accumulated time.
///
/// Serializes as a plain JSON object keyed by site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<SiteKey, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `seconds` to `key`, creating the entry if needed, and records
    /// `title` as the latest title. Zero seconds is a no-op.
    ///
    /// Returns the entry's total after the commit.
    pub fn commit(&mut self, key: SiteKey, title: impl Into<String>, seconds: u64) -> u64 {
        if seconds == 0 {
            return self.seconds_for(&key);
        }

        let title = title.into();
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| LedgerEntry::new(String::new(), 0));
        entry.accumulated_seconds = entry.accumulated_seconds.saturating_add(seconds);
        entry.display_title = title;
        entry.accumulated_seconds
    }

    /// Drops the synced portion of each confirmed site.
    ///
    /// An entry whose current total equals what was sent is removed. One that
    /// grew while the sync was in flight is removed and re-created holding only
    /// the unsent remainder, so time committed mid-round survives.
    pub fn settle(&mut self, synced: &[SyncedSite]) -> SettleSummary {
        let mut summary = SettleSummary::default();

        for site in synced {
            let Some(entry) = self.entries.remove(&site.key) else {
                continue;
            };

            let remainder = entry.accumulated_seconds.saturating_sub(site.seconds);
            if remainder == 0 {
                summary.removed += 1;
            } else {
                debug!(
                    site = %site.key,
                    sent = site.seconds,
                    remainder,
                    "Ledger entry grew during sync, carrying remainder"
                );
                self.entries
                    .insert(site.key.clone(), LedgerEntry::new(entry.display_title, remainder));
                summary.carried_over += 1;
            }
        }

        summary
    }

    /// Clears every entry.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &SiteKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn seconds_for(&self, key: &SiteKey) -> u64 {
        self.entries.get(key).map_or(0, |e| e.accumulated_seconds)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteKey, &LedgerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Formats a number of seconds for display: "35s", "2m 15s", "1h 30m".
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 {
            format!("{mins}m")
        } else {
            format!("{mins}m {remaining_secs}s")
        }
    } else {
        let hours = secs / 3600;
        let remaining_mins = (secs % 3600) / 60;
        if remaining_mins == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {remaining_mins}m")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SiteKey {
        SiteKey::new(s)
    }

    #[test]
    fn test_commit_accumulates_and_keeps_latest_title() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.commit(key("a.com"), "First", 5), 5);
        assert_eq!(ledger.commit(key("a.com"), "Second", 7), 12);

        let entry = ledger.get(&key("a.com")).unwrap();
        assert_eq!(entry.accumulated_seconds, 12);
        assert_eq!(entry.display_title, "Second");
    }

    #[test]
    fn test_zero_second_commit_creates_nothing() {
        let mut ledger = Ledger::new();
        ledger.commit(key("a.com"), "A", 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_settle_removes_only_confirmed_sites() {
        let mut ledger = Ledger::new();
        ledger.commit(key("a.com"), "A", 10);
        ledger.commit(key("b.com"), "B", 20);

        let summary = ledger.settle(&[SyncedSite { key: key("a.com"), seconds: 10 }]);

        assert_eq!(summary, SettleSummary { removed: 1, carried_over: 0 });
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.seconds_for(&key("b.com")), 20);
    }

    #[test]
    fn test_settle_carries_time_added_mid_round() {
        let mut ledger = Ledger::new();
        ledger.commit(key("a.com"), "A", 10);
        // Tracker commits while the request for the 10s snapshot is in flight
        ledger.commit(key("a.com"), "A again", 4);

        let summary = ledger.settle(&[SyncedSite { key: key("a.com"), seconds: 10 }]);

        assert_eq!(summary.carried_over, 1);
        let entry = ledger.get(&key("a.com")).unwrap();
        assert_eq!(entry.accumulated_seconds, 4);
        assert_eq!(entry.display_title, "A again");
    }

    #[test]
    fn test_settle_ignores_sites_reset_mid_round() {
        let mut ledger = Ledger::new();
        let summary = ledger.settle(&[SyncedSite { key: key("gone.com"), seconds: 3 }]);
        assert_eq!(summary, SettleSummary::default());
    }

    #[test]
    fn test_serializes_as_site_map() {
        let mut ledger = Ledger::new();
        ledger.commit(key("a.com"), "A", 3);
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["a.com"]["accumulated_seconds"], 3);
        assert_eq!(json["a.com"]["display_title"], "A");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(35), "35s");
        assert_eq!(format_duration(135), "2m 15s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(5_400), "1h 30m");
        assert_eq!(format_duration(7_200), "2h");
    }
}
