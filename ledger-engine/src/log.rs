//! Append-only entry log with O(1) snapshots
//!
//! Entries live in fixed-size sealed segments plus one open tail segment, all
//! behind `Arc`s. Cloning an [`EntryLog`] copies two pointers, so a reader can
//! take a view under a lock and walk it after releasing the lock.
//!
//! Appending while a reader still holds a view copies at most the open tail
//! (`SEGMENT_LEN` entries); sealing a segment while a view is held copies the
//! segment directory (one pointer per sealed segment).

use crate::types::Entry;
use std::sync::Arc;

/// Entries per sealed segment
pub const SEGMENT_LEN: usize = 1024;

/// Append-only, cheaply clonable log
#[derive(Debug, Clone, Default)]
pub struct EntryLog {
    sealed: Arc<Vec<Arc<[Entry]>>>,
    tail: Arc<Vec<Entry>>,
}

impl EntryLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> u64 {
        (self.sealed.len() * SEGMENT_LEN + self.tail.len()) as u64
    }

    /// True when nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry at `index`
    pub fn get(&self, index: u64) -> Option<&Entry> {
        let index = usize::try_from(index).ok()?;
        let (segment, offset) = (index / SEGMENT_LEN, index % SEGMENT_LEN);

        match self.sealed.get(segment) {
            Some(sealed) => sealed.get(offset),
            None if segment == self.sealed.len() => self.tail.get(offset),
            None => None,
        }
    }

    /// Append one entry
    pub fn push(&mut self, entry: Entry) {
        let tail = Arc::make_mut(&mut self.tail);
        tail.push(entry);

        if tail.len() == SEGMENT_LEN {
            let full: Arc<[Entry]> = std::mem::take(tail).into();
            Arc::make_mut(&mut self.sealed).push(full);
        }
    }

    /// All entries in index order (reversible for newest-first walks)
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Entry> + '_ {
        self.sealed
            .iter()
            .flat_map(|segment| segment.iter())
            .chain(self.tail.iter())
    }
}

impl PartialEq for EntryLog {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for EntryLog {}
