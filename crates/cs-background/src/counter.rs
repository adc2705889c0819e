//! Per-session hit counters

use std::collections::HashMap;

/// Ephemeral per-session hit counters. Lives as long as the background
/// context; only the lifetime total is persisted, by the coordinator.
#[derive(Debug, Default)]
pub struct HitCounter {
    sessions: HashMap<i64, u64>,
}

impl HitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a hit for `session_id`. Missing or negative ids (requests not
    /// tied to a tab) are ignored here.
    pub fn record(&mut self, session_id: Option<i64>) {
        if let Some(id) = session_id.filter(|id| *id >= 0) {
            *self.sessions.entry(id).or_insert(0) += 1;
        }
    }

    pub fn get(&self, session_id: Option<i64>) -> u64 {
        session_id
            .and_then(|id| self.sessions.get(&id))
            .copied()
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_session() {
        let mut counter = HitCounter::new();
        counter.record(Some(3));
        counter.record(Some(3));
        counter.record(Some(7));
        assert_eq!(counter.get(Some(3)), 2);
        assert_eq!(counter.get(Some(7)), 1);
        assert_eq!(counter.get(Some(9)), 0);
        assert_eq!(counter.get(None), 0);
    }

    #[test]
    fn ignores_untracked_sessions() {
        let mut counter = HitCounter::new();
        counter.record(Some(-1));
        counter.record(None);
        assert!(counter.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut counter = HitCounter::new();
        counter.record(Some(1));
        counter.record(Some(2));
        counter.clear();
        assert_eq!(counter.len(), 0);
        assert_eq!(counter.get(Some(1)), 0);
    }
}
