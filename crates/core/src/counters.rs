//! Aggregate hide counters reported to the UI.

use std::collections::HashSet;

use serde::Serialize;

use crate::extract::{ItemIdentifier, ItemKind};

/// Snapshot of the counters, serialized as `{ videosHidden, channelsHidden }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub videos_hidden: u64,
    pub channels_hidden: u64,
}

impl CounterSnapshot {
    pub fn total(&self) -> u64 {
        self.videos_hidden + self.channels_hidden
    }
}

/// Monotonic hide counters for one session.
///
/// Each identifier is counted at most once, so restoring and re-hiding the
/// same item does not inflate the totals. Only [`FilterCounters::reset`]
/// brings them back to zero.
#[derive(Debug, Default, Clone)]
pub struct FilterCounters {
    snapshot: CounterSnapshot,
    counted: HashSet<ItemIdentifier>,
}

impl FilterCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hidden item. Returns whether the totals moved.
    pub fn record_hidden(&mut self, id: &ItemIdentifier) -> bool {
        if !self.counted.insert(id.clone()) {
            return false;
        }
        match id.kind {
            ItemKind::Video => self.snapshot.videos_hidden += 1,
            ItemKind::Channel => self.snapshot.channels_hidden += 1,
        }
        true
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.snapshot
    }

    /// Explicit external reset.
    pub fn reset(&mut self) {
        self.snapshot = CounterSnapshot::default();
        self.counted.clear();
    }
}
