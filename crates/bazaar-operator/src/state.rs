//! Shared hub state: which default catalog sources are currently disabled.
//!
//! Written only by the hub loop, read by the catalog-source loop. This is a
//! derived cache of the CatalogHub spec, recomputed on every relevant event,
//! never persisted. The two loops share it through an injected `Arc` so tests
//! can substitute their own instance.

use std::collections::BTreeSet;
use std::sync::RwLock;

/// Last-observed enable/disable partition of the default registry.
///
/// A reader always sees a complete set: mutation happens by whole-set
/// replacement under the write lock, reads clone under the read lock.
#[derive(Debug, Default)]
pub struct HubState {
    disabled: RwLock<BTreeSet<String>>,
}

impl HubState {
    /// Create an empty state (nothing disabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the disabled set.
    pub fn disabled(&self) -> BTreeSet<String> {
        self.read_guard().clone()
    }

    /// Whether a single name is disabled.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.read_guard().contains(name)
    }

    /// Replace the disabled set, returning the previous one.
    pub fn replace(&self, disabled: BTreeSet<String>) -> BTreeSet<String> {
        let mut guard = self
            .disabled
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut guard, disabled)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<String>> {
        self.disabled
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_starts_empty() {
        let state = HubState::new();
        assert!(state.disabled().is_empty());
        assert!(!state.is_disabled("community"));
    }

    #[test]
    fn test_replace_returns_previous() {
        let state = HubState::new();
        assert!(state.replace(set(&["community"])).is_empty());
        assert_eq!(state.replace(set(&["certified"])), set(&["community"]));
        assert!(state.is_disabled("certified"));
        assert!(!state.is_disabled("community"));
    }

    #[test]
    fn test_readers_see_whole_sets() {
        let state = Arc::new(HubState::new());
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    state.replace(set(&["a", "b"]));
                    state.replace(set(&[]));
                }
            })
        };
        for _ in 0..100 {
            let snapshot = state.disabled();
            // Replacement is atomic: either both names or neither.
            assert!(snapshot.len() == 2 || snapshot.is_empty());
        }
        writer.join().expect("writer thread");
    }
}
