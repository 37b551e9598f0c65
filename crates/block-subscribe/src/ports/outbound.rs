//! Driven ports: the downstream consumer.

use async_trait::async_trait;
use shared_types::AssembledBlock;

/// The single downstream consumer of the pipeline.
///
/// Injected at construction; replaces ad-hoc event-listener registration
/// while preserving the single-consumer, in-order delivery contract.
#[async_trait]
pub trait BlockSink: Send + Sync {
    /// Handle one assembled block.
    ///
    /// Called by the notifier strictly in increasing block-number order. An
    /// error is fatal to the pipeline: the consumer's fork ledger relies on
    /// its crash-recovery scan rather than in-process retries.
    async fn block(&self, block: AssembledBlock) -> anyhow::Result<()>;

    /// Observe a new irreversibility watermark.
    ///
    /// Must not suspend: the commit handler is synchronous so it can never
    /// interleave with a partially applied accept handler.
    fn irreversible_block_num(&self, block_num: u64);
}
