//! The ledger-backed block consumer.

use async_trait::async_trait;
use block_subscribe::BlockSink;
use fork_ledger::adapters::{InMemoryEntityRegistry, InMemoryForkStore};
use fork_ledger::{BlockRef, ChangeSet, EntityGateway, ForkLedger, UndoKind};
use serde_json::json;
use shared_types::AssembledBlock;
use std::sync::Arc;
use tracing::{debug, info};

/// Collection holding one header document per delivered block.
pub const BLOCKS_COLLECTION: &str = "blocks";

/// Consumes delivered blocks into the fork ledger.
///
/// Each block is processed inside a `wrap_block` frame: a header document is
/// materialized into the blocks collection and registered as a reversible
/// create, so a fork rolls the document back out again.
pub struct LedgerBlockHandler {
    ledger: Arc<ForkLedger<InMemoryForkStore>>,
    registry: Arc<InMemoryEntityRegistry>,
}

impl LedgerBlockHandler {
    /// Create a handler over `ledger`, materializing into `registry`.
    pub fn new(
        ledger: Arc<ForkLedger<InMemoryForkStore>>,
        registry: Arc<InMemoryEntityRegistry>,
    ) -> Self {
        // Register the collection up front so reverts can resolve it even
        // before the first block arrives.
        registry.collection(BLOCKS_COLLECTION);
        Self { ledger, registry }
    }

    fn header_document(block: &AssembledBlock) -> serde_json::Value {
        let trx_count = block.transactions.len();
        let missing = block
            .transactions
            .iter()
            .filter(|trx| trx.is_none())
            .count();
        json!({
            "id": block.id,
            "block_num": block.block_num,
            "block_time": block.block_time,
            "trx_count": trx_count,
            "missing_trx_count": missing,
        })
    }
}

#[async_trait]
impl BlockSink for LedgerBlockHandler {
    async fn block(&self, block: AssembledBlock) -> anyhow::Result<()> {
        debug!(block_num = block.block_num, id = %block.id, "Processing block");

        let blocks = self.registry.collection(BLOCKS_COLLECTION);
        let document = Self::header_document(&block);
        let entity_id = block.id.clone();

        self.ledger
            .wrap_block(BlockRef::from(&block), || async {
                blocks.create(&entity_id, document).await?;
                self.ledger
                    .register_changes(ChangeSet {
                        kind: UndoKind::Create,
                        collection: BLOCKS_COLLECTION.to_owned(),
                        entity_id: entity_id.clone(),
                        prior: None,
                    })
                    .await?;
                Ok(())
            })
            .await?;

        info!(block_num = block.block_num, "Block processed");
        Ok(())
    }

    fn irreversible_block_num(&self, block_num: u64) {
        // Pruning is asynchronous and best-effort; the commit handler must
        // not suspend.
        let ledger = Arc::clone(&self.ledger);
        tokio::spawn(async move {
            ledger.register_irreversible_block(block_num).await;
        });
    }
}
