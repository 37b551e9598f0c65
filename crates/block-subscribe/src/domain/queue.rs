//! Delivery and holdback queues.
//!
//! Both are strict FIFO and strictly increasing by block number: the broker
//! delivers accept messages in order and nothing here re-sorts.

use shared_types::AssembledBlock;
use std::collections::VecDeque;

/// Blocks waiting for the notifier.
#[derive(Default)]
pub struct DeliveryQueue {
    queue: VecDeque<AssembledBlock>,
}

impl DeliveryQueue {
    /// Append a block.
    pub fn push(&mut self, block: AssembledBlock) {
        self.queue.push_back(block);
    }

    /// Append blocks released from holdback, preserving their order.
    pub fn extend(&mut self, blocks: Vec<AssembledBlock>) {
        self.queue.extend(blocks);
    }

    /// Take the oldest queued block.
    pub fn pop(&mut self) -> Option<AssembledBlock> {
        self.queue.pop_front()
    }

    /// Number of queued blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Blocks held back until the irreversibility watermark passes them.
#[derive(Default)]
pub struct HoldbackQueue {
    queue: VecDeque<AssembledBlock>,
}

impl HoldbackQueue {
    /// Hold an assembled block.
    pub fn push(&mut self, block: AssembledBlock) {
        self.queue.push_back(block);
    }

    /// Release the ordered prefix with `block_num <= watermark`.
    ///
    /// The queue is ordered, so this stops at the first block still above the
    /// watermark; a later block can never be released before an earlier one.
    pub fn release_upto(&mut self, watermark: u64) -> Vec<AssembledBlock> {
        let mut released = Vec::new();
        while self
            .queue
            .front()
            .is_some_and(|block| block.block_num <= watermark)
        {
            // Front exists per the check above.
            if let Some(block) = self.queue.pop_front() {
                released.push(block);
            }
        }
        released
    }

    /// Number of held blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
