//! In-memory deduplication store
//!
//! Tracks which `(provider, id)` pairs have already been admitted so that a
//! feed returning its historical entries on every poll does not re-dispatch
//! them to consumers.
//!
//! - Atomic check-and-set: concurrent callers never both see `true` for a key
//! - Membership only grows; nothing is evicted or persisted

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{DedupKey, StatusEvent};

// ============================================================================
// Deduplication Store
// ============================================================================

/// Process-lifetime set of admitted dedup keys
#[derive(Debug, Default)]
pub struct DeduplicationStore {
    /// Every key ever admitted
    seen: Mutex<HashSet<DedupKey>>,
}

impl DeduplicationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::with_capacity(capacity)),
        }
    }

    /// Admit `(provider, id)` if it has never been seen
    ///
    /// Returns `true` exactly once per key for the lifetime of the store.
    pub fn is_new(&self, provider: &str, id: &str) -> bool {
        self.lock().insert(DedupKey::new(provider, id))
    }

    /// Admit an event by its own `(provider, id)` pair
    pub fn is_new_event(&self, event: &StatusEvent) -> bool {
        self.lock().insert(event.dedup_key())
    }

    /// Check membership without admitting
    pub fn contains(&self, provider: &str, id: &str) -> bool {
        self.lock().contains(&DedupKey::new(provider, id))
    }

    /// Number of keys tracked
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key has been admitted yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the set half-updated,
    // so a poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashSet<DedupKey>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_first_call_is_new_then_duplicate() {
        let store = DeduplicationStore::new();
        assert!(store.is_new("openai", "inc-1"));
        assert!(!store.is_new("openai", "inc-1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_id_different_provider_is_distinct() {
        let store = DeduplicationStore::new();
        assert!(store.is_new("openai", "inc-1"));
        assert!(store.is_new("github", "inc-1"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_contains_does_not_admit() {
        let store = DeduplicationStore::with_capacity(8);
        assert!(store.is_empty());
        assert!(!store.contains("openai", "inc-1"));
        assert!(store.is_empty());
        assert!(store.is_new("openai", "inc-1"));
        assert!(store.contains("openai", "inc-1"));
    }

    #[test]
    fn test_is_new_event_uses_event_key() {
        let store = DeduplicationStore::new();
        let event = StatusEvent::new("OpenAI", "inc-7:API", "API", "Outage -- Resolved", Utc::now());
        assert!(store.is_new_event(&event));
        assert!(!store.is_new("OpenAI", "inc-7:API"));
    }

    #[test]
    fn test_concurrent_callers_admit_once() {
        let store = Arc::new(DeduplicationStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| store.is_new("openai", &format!("inc-{i}")))
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert_eq!(store.len(), 100);
    }

    proptest! {
        #[test]
        fn prop_admits_exactly_first_occurrence(ids in proptest::collection::vec(0u8..20, 0..200)) {
            let store = DeduplicationStore::new();
            let mut expected = HashSet::new();
            for id in ids {
                let id = id.to_string();
                prop_assert_eq!(store.is_new("p", &id), expected.insert(id));
            }
            prop_assert_eq!(store.len(), expected.len());
        }
    }
}
