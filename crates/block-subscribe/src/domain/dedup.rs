//! Duplicate accept-message filter.

use std::collections::HashMap;

/// Remembers recently handled block ids so redelivered accept messages
/// (broker replay is at-least-once) are suppressed.
///
/// Invariant after a sweep: every entry satisfies
/// `block_num >= current_block_num - retention_window`.
#[derive(Default)]
pub struct DuplicateFilter {
    handled: HashMap<String, u64>,
}

impl DuplicateFilter {
    /// Whether this block id was already handled.
    #[must_use]
    pub fn contains(&self, block_id: &str) -> bool {
        self.handled.contains_key(block_id)
    }

    /// Record a handled block.
    pub fn insert(&mut self, block_id: String, block_num: u64) {
        self.handled.insert(block_id, block_num);
    }

    /// Block ids currently remembered, for the cooperative sweep.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.handled.keys().cloned().collect()
    }

    /// Drop `block_id` if its block number is below `threshold_block`.
    /// Returns whether an entry was removed.
    pub fn prune_if_older(&mut self, block_id: &str, threshold_block: u64) -> bool {
        match self.handled.get(block_id) {
            Some(&block_num) if block_num < threshold_block => {
                self.handled.remove(block_id);
                true
            }
            _ => false,
        }
    }

    /// Number of remembered block ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handled.len()
    }

    /// Whether the filter is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }
}
