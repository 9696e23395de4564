//! Event deduplication across overlapping inputs.

use std::collections::HashSet;

use skim_core::EventKey;

/// Insert-only set of the physical events already seen in this scan.
#[derive(Debug, Clone, Default)]
pub struct EventDeduplicator {
    seen: HashSet<EventKey>,
}

impl EventDeduplicator {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`; `true` when it had not been seen before.
    pub fn observe(&mut self, key: EventKey) -> bool {
        self.seen.insert(key)
    }

    /// Whether `key` has been seen.
    pub fn contains(&self, key: &EventKey) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct events seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Nothing seen yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_once() {
        let mut d = EventDeduplicator::new();
        let k = EventKey::new(190645, 1, 10);
        assert!(d.observe(k));
        assert!(!d.observe(k));
        assert!(!d.observe(k));
        assert!(d.observe(EventKey::new(190645, 1, 11)));
        assert_eq!(d.len(), 2);
        assert!(d.contains(&k));
    }
}
