//! Applying and reverting the hidden state of containers.

use std::collections::HashMap;

use ego_tree::NodeId;

use crate::extract::ItemKind;
use crate::parse::FeedDocument;

/// Toggles the presentation state of containers.
///
/// Only the presentation overlay of the document is touched; node content
/// is never removed or rewritten, so every hide can be reverted. Both
/// operations are idempotent and report success for no-ops. They fail only
/// when the node is not an element of the document.
#[derive(Debug, Default)]
pub struct VisibilityActuator {
    hidden: HashMap<NodeId, ItemKind>,
}

impl VisibilityActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides a container.
    pub fn hide(&mut self, doc: &mut FeedDocument, container: NodeId, kind: ItemKind) -> bool {
        match doc.set_hidden(container, true) {
            Some(_) => {
                self.hidden.insert(container, kind);
                true
            }
            None => false,
        }
    }

    /// Shows a container.
    pub fn show(&mut self, doc: &mut FeedDocument, container: NodeId) -> bool {
        match doc.set_hidden(container, false) {
            Some(_) => {
                self.hidden.remove(&container);
                true
            }
            None => false,
        }
    }

    /// Shows every container this actuator hid. Returns how many were restored.
    pub fn restore_all(&mut self, doc: &mut FeedDocument) -> usize {
        let restored = self
            .hidden
            .drain()
            .filter(|(id, _)| doc.set_hidden(*id, false).unwrap_or(false))
            .count();
        tracing::debug!(restored, "restored hidden containers");
        restored
    }

    /// Shows the containers of one item kind.
    pub fn restore_kind(&mut self, doc: &mut FeedDocument, kind: ItemKind) -> usize {
        let ids: Vec<NodeId> = self.hidden.iter().filter(|(_, k)| **k == kind).map(|(id, _)| *id).collect();
        ids.into_iter().filter(|id| self.show(doc, *id)).count()
    }

    /// Drops containers that are no longer attached to `doc`. Returns how
    /// many were dropped.
    pub fn prune(&mut self, doc: &FeedDocument) -> usize {
        let before = self.hidden.len();
        self.hidden.retain(|id, _| doc.is_attached(*id));
        before - self.hidden.len()
    }

    /// Containers currently hidden by this actuator.
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    pub fn is_hidden(&self, container: NodeId) -> bool {
        self.hidden.contains_key(&container)
    }

    /// Drops all bookkeeping without touching a document (new page).
    pub fn forget(&mut self) {
        self.hidden.clear();
    }
}
