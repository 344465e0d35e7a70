//! Bounded, linear undo/redo log over full snapshots of a page's items.
//!
//! Every checkpoint stores the whole translation list. Lists are small
//! (tens of items), so snapshots are cheap and undo never has to replay
//! anything. Committing after an undo drops the redo branch.

use std::collections::VecDeque;
use tracing::debug;

use crate::model::TranslationItem;

/// Maximum number of snapshots kept per page
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A full copy of a page's translation list
pub type Snapshot = Vec<TranslationItem>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHistoryLog {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    capacity: usize,
}

impl Default for PageHistoryLog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PageHistoryLog {
    /// Create a log seeded with one snapshot, using the default capacity.
    pub fn new(initial: Snapshot) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a log seeded with one snapshot. A capacity of 0 is treated as 1.
    pub fn with_capacity(initial: Snapshot, capacity: usize) -> Self {
        let mut entries = VecDeque::with_capacity(capacity.clamp(1, DEFAULT_HISTORY_CAPACITY));
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record `current` as a new checkpoint.
    ///
    /// Returns `false` without touching the log when `current` equals the
    /// snapshot under the cursor.
    pub fn commit(&mut self, current: &[TranslationItem]) -> bool {
        if self.entries[self.cursor].as_slice() == current {
            return false;
        }

        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(current.to_vec());
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.cursor -= 1;
        }

        debug!(
            "History commit: {} entries, cursor at {}",
            self.entries.len(),
            self.cursor
        );
        true
    }

    /// Step back one checkpoint. `None` when already at the oldest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    /// Step forward one checkpoint. `None` when already at the newest entry.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len() - 1
    }

    /// Discard all checkpoints and start over from `initial`.
    pub fn reset(&mut self, initial: Snapshot) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
    }

    /// Snapshot under the cursor
    pub fn current(&self) -> &Snapshot {
        &self.entries[self.cursor]
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the log holds at least one snapshot.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}
