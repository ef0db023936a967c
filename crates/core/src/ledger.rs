//! Dedup ledger of already evaluated items.

use std::collections::HashSet;

use crate::extract::{ItemIdentifier, ItemKind};

/// Identifiers evaluated during the current page view.
///
/// Once an identifier is marked it is never evaluated again, even if its
/// card is removed and a new card with the same identifier shows up later.
/// Only navigation to a new document (or re-arming the filter) clears it.
#[derive(Debug, Default, Clone)]
pub struct DedupLedger {
    seen: HashSet<ItemIdentifier>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }

    pub fn has_seen(&self, id: &ItemIdentifier) -> bool {
        self.seen.contains(id)
    }

    /// Marks an identifier as evaluated. Returns `false` if it already was.
    pub fn mark_seen(&mut self, id: ItemIdentifier) -> bool {
        self.seen.insert(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Forgets every identifier of one kind. Returns how many were dropped.
    pub fn forget_kind(&mut self, kind: ItemKind) -> usize {
        let before = self.seen.len();
        self.seen.retain(|id| id.kind != kind);
        before - self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let mut ledger = DedupLedger::new();
        let id = ItemIdentifier::video("abc123");

        assert!(!ledger.has_seen(&id));
        assert!(ledger.mark_seen(id.clone()));
        assert!(ledger.has_seen(&id));
        assert!(!ledger.mark_seen(id));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let mut ledger = DedupLedger::new();
        ledger.mark_seen(ItemIdentifier::video("same"));
        assert!(!ledger.has_seen(&ItemIdentifier::channel("same")));
    }

    #[test]
    fn test_clear() {
        let mut ledger = DedupLedger::new();
        ledger.mark_seen(ItemIdentifier::video("abc123"));
        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_forget_kind() {
        let mut ledger = DedupLedger::new();
        ledger.mark_seen(ItemIdentifier::video("a"));
        ledger.mark_seen(ItemIdentifier::video("b"));
        ledger.mark_seen(ItemIdentifier::channel("@c"));

        assert_eq!(ledger.forget_kind(ItemKind::Video), 2);
        assert!(!ledger.has_seen(&ItemIdentifier::video("a")));
        assert!(ledger.has_seen(&ItemIdentifier::channel("@c")));
    }
}
