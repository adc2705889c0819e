//! Persisted configuration record
//!
//! Stored as a single JSON object under one storage key:
//! `{enabled: bool, allowlist: string[], counts: {total: int}}`.
//! Missing fields fall back to their defaults on load.

use serde::{Deserialize, Serialize};

use crate::host::{normalize_allowlist, normalize_host};

/// Lifetime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    /// Filtered requests since install or the last reset
    pub total: u64,
}

/// The shared configuration: global switch, allowlist and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRecord {
    pub enabled: bool,
    /// Domains where blocking is suppressed. Always normalized.
    pub allowlist: Vec<String>,
    pub counts: Counts,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            enabled: true,
            allowlist: Vec::new(),
            counts: Counts::default(),
        }
    }
}

impl ConfigRecord {
    /// Re-establish the allowlist invariant on a record read from storage.
    pub fn normalized(mut self) -> Self {
        self.allowlist = normalize_allowlist(&self.allowlist);
        self
    }

    /// A site is blocked unless it is on the allowlist.
    pub fn is_site_blocked(&self, site: &str) -> bool {
        let host = normalize_host(site);
        !self.allowlist.iter().any(|d| *d == host)
    }

    /// Set whether filtering applies on `site`. Returns false when the site
    /// normalizes to nothing and the record was left untouched.
    pub fn set_site_blocked(&mut self, site: &str, block: bool) -> bool {
        let host = normalize_host(site);
        if host.is_empty() {
            return false;
        }
        if block {
            self.allowlist.retain(|d| *d != host);
        } else if !self.allowlist.contains(&host) {
            self.allowlist.push(host);
        }
        true
    }

    /// Add one filtered request to the lifetime total.
    pub fn record_hit(&mut self) {
        self.counts.total = self.counts.total.saturating_add(1);
    }

    pub fn reset_counts(&mut self) {
        self.counts = Counts::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_filtering() {
        let record = ConfigRecord::default();
        assert!(record.enabled);
        assert!(record.allowlist.is_empty());
        assert_eq!(record.counts.total, 0);
    }

    #[test]
    fn toggling_a_site_updates_allowlist() {
        let mut record = ConfigRecord::default();
        assert!(record.set_site_blocked("https://Example.com/watch", false));
        assert_eq!(record.allowlist, vec!["example.com".to_string()]);
        assert!(!record.is_site_blocked("example.com"));

        // Allowing twice does not duplicate
        record.set_site_blocked("example.com", false);
        assert_eq!(record.allowlist.len(), 1);

        record.set_site_blocked("EXAMPLE.com", true);
        assert!(record.allowlist.is_empty());
        assert!(record.is_site_blocked("example.com"));
    }

    #[test]
    fn empty_site_is_rejected() {
        let mut record = ConfigRecord::default();
        assert!(!record.set_site_blocked("   ", false));
        assert!(record.allowlist.is_empty());
    }

    #[test]
    fn normalized_repairs_raw_entries() {
        let record = ConfigRecord {
            allowlist: vec!["HTTPS://A.com/x".into(), "a.com".into(), "".into()],
            ..ConfigRecord::default()
        }
        .normalized();
        assert_eq!(record.allowlist, vec!["a.com".to_string()]);
    }

    #[test]
    fn hits_and_reset() {
        let mut record = ConfigRecord::default();
        record.record_hit();
        record.record_hit();
        assert_eq!(record.counts.total, 2);
        record.reset_counts();
        assert_eq!(record.counts.total, 0);
    }
}
