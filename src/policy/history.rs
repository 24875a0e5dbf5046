//! Bounded record of recently decoded messages.

use std::collections::VecDeque;

use crate::protocol::Role;
use crate::registry::Message;

/// One decoded message as the bridge saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    /// Side that sent it.
    pub origin: Role,
    /// Counter after rewriting, for client-to-server frames.
    pub counter: Option<u32>,
    /// Decoded message.
    pub message: Message,
}

/// Ring of the last `capacity` observed messages. The oldest entry is
/// evicted first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Observed>,
    capacity: usize,
}

impl History {
    /// Create an empty ring. A capacity of zero keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: Observed) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries held.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&Observed> {
        self.entries.back()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Observed> {
        self.entries.iter()
    }
}
