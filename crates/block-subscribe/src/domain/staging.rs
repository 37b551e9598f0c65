//! Transaction staging buffer.

use shared_types::messages::{TransactionApply, TrxRef};
use std::collections::HashMap;

/// A staged transaction plus the block height current when it arrived.
struct StagedTransaction {
    transaction: TransactionApply,
    /// Block number current at staging time; zero before any block was seen.
    /// Used to age out orphans whose block never arrives.
    staged_at_block: u64,
}

/// Holds transactions announced individually until the block that references
/// them arrives.
///
/// Orphaned entries (e.g. a dropped accept message) are pruned by the same
/// sweep that prunes the duplicate filter, using the block number that was
/// current when they were staged.
#[derive(Default)]
pub struct StagingBuffer {
    pending: HashMap<String, StagedTransaction>,
}

impl StagingBuffer {
    /// Stage a transaction. A redelivered announcement overwrites the
    /// previous entry, which is identical content-wise.
    pub fn insert(&mut self, transaction: TransactionApply, current_block_num: Option<u64>) {
        self.pending.insert(
            transaction.id.clone(),
            StagedTransaction {
                transaction,
                staged_at_block: current_block_num.unwrap_or(0),
            },
        );
    }

    /// Remove and return the referenced transactions, in reference order.
    ///
    /// A miss yields `None` at that position; the caller decides whether a
    /// miss is the bootstrap race or a reproducibility bug.
    pub fn extract(&mut self, refs: &[TrxRef]) -> Vec<Option<TransactionApply>> {
        refs.iter()
            .map(|r| self.pending.remove(&r.id).map(|staged| staged.transaction))
            .collect()
    }

    /// Ids currently staged, for the cooperative sweep.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.pending.keys().cloned().collect()
    }

    /// Drop `id` if it was staged below `threshold_block`. Returns whether
    /// an entry was removed.
    pub fn prune_if_older(&mut self, id: &str, threshold_block: u64) -> bool {
        match self.pending.get(id) {
            Some(staged) if staged.staged_at_block < threshold_block => {
                self.pending.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Number of staged transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trx(id: &str) -> TransactionApply {
        TransactionApply {
            id: id.into(),
            actions: vec![],
        }
    }

    fn refs(ids: &[&str]) -> Vec<TrxRef> {
        ids.iter().map(|id| TrxRef { id: (*id).into() }).collect()
    }

    #[test]
    fn extract_preserves_reference_order_and_consumes() {
        let mut buffer = StagingBuffer::default();
        buffer.insert(trx("a"), Some(5));
        buffer.insert(trx("b"), Some(5));
        buffer.insert(trx("c"), Some(5));

        let extracted = buffer.extract(&refs(&["b", "a"]));
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].as_ref().unwrap().id, "b");
        assert_eq!(extracted[1].as_ref().unwrap().id, "a");

        // Consumed entries miss on a second lookup.
        let again = buffer.extract(&refs(&["a", "b"]));
        assert!(again.iter().all(Option::is_none));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn extract_reports_misses_in_place() {
        let mut buffer = StagingBuffer::default();
        buffer.insert(trx("a"), Some(1));

        let extracted = buffer.extract(&refs(&["missing", "a"]));
        assert!(extracted[0].is_none());
        assert!(extracted[1].is_some());
    }

    #[test]
    fn prune_drops_only_old_entries() {
        let mut buffer = StagingBuffer::default();
        buffer.insert(trx("old"), Some(10));
        buffer.insert(trx("fresh"), Some(500));
        buffer.insert(trx("bootstrap"), None);

        assert!(buffer.prune_if_older("old", 100));
        assert!(!buffer.prune_if_older("fresh", 100));
        assert!(buffer.prune_if_older("bootstrap", 100));
        assert_eq!(buffer.len(), 1);
    }
}
