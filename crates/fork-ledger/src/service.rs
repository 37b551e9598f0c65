//! The fork ledger service.

use crate::domain::{BlockRef, ChangeSet, ForkRecord, UndoItem, UndoKind};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{EntityResolver, ForkRecordStore, RevertHook, RevertObserver};
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::ResumeCursor;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// How many trailing records the crash-recovery scan examines.
///
/// A crash leaves at most one block mid-flight, but the window also covers a
/// short run of records that failed to finalize across repeated crashes.
pub const RECOVERY_SCAN_LIMIT: usize = 10;

/// Fork-aware mutation ledger.
///
/// Generic over the record store `S`; the consumer's entity resolver and any
/// per-collection revert hooks are injected at construction.
pub struct ForkLedger<S>
where
    S: ForkRecordStore,
{
    store: Arc<S>,
    resolver: Arc<dyn EntityResolver>,
    hooks: HashMap<String, Arc<dyn RevertHook>>,
    observer: Option<Arc<dyn RevertObserver>>,
    /// Number of the currently open block, if any. Single-writer discipline:
    /// the undo stack of the open block is owned exclusively by this ledger.
    open_block: Mutex<Option<u64>>,
}

impl<S> ForkLedger<S>
where
    S: ForkRecordStore,
{
    /// Create a ledger over `store`, resolving collections through
    /// `resolver`.
    pub fn new(store: Arc<S>, resolver: Arc<dyn EntityResolver>) -> Self {
        Self {
            store,
            resolver,
            hooks: HashMap::new(),
            observer: None,
            open_block: Mutex::new(None),
        }
    }

    /// Override the generic undo logic for one collection.
    #[must_use]
    pub fn with_hook(mut self, collection: impl Into<String>, hook: Arc<dyn RevertHook>) -> Self {
        self.hooks.insert(collection.into(), hook);
        self
    }

    /// Observe reverted record batches.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RevertObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Process one block inside a begin/commit frame.
    ///
    /// Creates an unfinalized record, runs `handler`, and finalizes the
    /// record on success. The open flag is cleared on every exit path; a
    /// handler failure leaves the record unfinalized for the recovery scan
    /// and propagates to the caller.
    pub async fn wrap_block<F, Fut>(&self, block: BlockRef, handler: F) -> LedgerResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        {
            let mut open = self.open_block.lock();
            if let Some(open_num) = *open {
                return Err(LedgerError::BlockAlreadyOpen {
                    open: open_num,
                    requested: block.block_num,
                });
            }
            *open = Some(block.block_num);
        }

        let result = self.process_block(block, handler).await;
        *self.open_block.lock() = None;
        result
    }

    async fn process_block<F, Fut>(&self, block: BlockRef, handler: F) -> LedgerResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.store
            .insert(ForkRecord {
                block_num: block.block_num,
                block_time: block.block_time,
                sequence: block.sequence,
                finalized: Some(false),
                stack: vec![],
            })
            .await?;

        handler().await.map_err(|source| LedgerError::Handler {
            block_num: block.block_num,
            source,
        })?;

        self.store.mark_finalized(block.block_num).await?;
        Ok(())
    }

    /// Record one reversible effect against the open block.
    ///
    /// Calling this with no block open is a usage error: it is logged and
    /// the change is still recorded against the newest record found, a
    /// best-effort fallback rather than a guarantee.
    pub async fn register_changes(&self, change: ChangeSet) -> LedgerResult<()> {
        if self.open_block.lock().is_none() {
            warn!(
                collection = %change.collection,
                entity_id = %change.entity_id,
                "register_changes called outside of block processing"
            );
        }

        let item = match self.hooks.get(&change.collection) {
            Some(hook) => hook.prepare_undo(&change),
            None => change.into_undo_item(),
        };

        let pushed = self.store.push_to_newest(item).await?;
        if !pushed {
            warn!("No ledger record exists to register the change against");
        }
        Ok(())
    }

    /// Roll every block strictly after `base_block_num` back.
    ///
    /// The record at exactly `base_block_num` is the required anchor; its
    /// absence means the ledger and the chain have diverged, and nothing is
    /// deleted. Re-running after a partial failure re-attempts only the
    /// remaining records.
    pub async fn revert(&self, base_block_num: u64) -> LedgerResult<()> {
        info!(base = base_block_num, "Revert on fork");

        let mut records = self.store.find_from(base_block_num).await?;
        // Descending order: the last element is the oldest, the anchor.
        match records.pop() {
            Some(anchor) if anchor.block_num == base_block_num => {}
            _ => return Err(LedgerError::BaseBlockMissing {
                base: base_block_num,
            }),
        }

        self.revert_records(&records).await?;

        // Records with empty stacks may remain; clear everything above base.
        self.store.delete_above(base_block_num).await?;

        info!(base = base_block_num, "Revert on fork done");
        Ok(())
    }

    /// Drop ledger records made obsolete by the irreversibility watermark.
    ///
    /// The record at `block_num - 1` is retained as a safety anchor for any
    /// future revert at or above the watermark. Failure only affects storage
    /// growth, never correctness, so it is logged and swallowed.
    pub async fn register_irreversible_block(&self, block_num: u64) {
        if let Err(err) = self.store.delete_below(block_num.saturating_sub(1)).await {
            warn!(block_num, error = %err, "Can't clear outdated fork records");
        }
    }

    /// Crash recovery: revert the unfinalized tail of the ledger.
    ///
    /// Run once at startup before resuming ingestion. Walks the newest
    /// records until the first finalized one, reverts everything above it,
    /// and returns that anchor as the resume cursor. Returns `Ok(None)` when
    /// nothing was unfinalized (so a second run is a no-op).
    pub async fn revert_unfinalized_blocks(&self) -> LedgerResult<Option<ResumeCursor>> {
        info!("Reverting unfinalized blocks");

        let records = self.store.find_newest(RECOVERY_SCAN_LIMIT).await?;
        if records.is_empty() {
            return Err(LedgerError::EmptyLedger);
        }

        let mut unfinalized: Vec<ForkRecord> = Vec::new();
        let mut last_finalized: Option<&ForkRecord> = None;

        if records[0].finalized.is_none() {
            // Legacy records predate the finalized flag: only the newest can
            // be mid-flight, and the one before it is taken as the anchor.
            unfinalized.push(records[0].clone());
            last_finalized = records.get(1);
        } else {
            for record in &records {
                if record.finalized == Some(true) {
                    last_finalized = Some(record);
                    break;
                }
                unfinalized.push(record.clone());
            }
        }

        let Some(anchor) = last_finalized else {
            return Err(LedgerError::NoFinalizedAnchor);
        };
        let cursor = ResumeCursor {
            block_num: anchor.block_num,
            sequence: anchor.sequence,
        };

        if unfinalized.is_empty() {
            return Ok(None);
        }

        self.revert_records(&unfinalized).await?;
        info!(
            reverted = unfinalized.len(),
            resume_block = cursor.block_num,
            "Unfinalized blocks reverted"
        );
        Ok(Some(cursor))
    }

    /// Whether the ledger holds any records. Used by startup wiring to skip
    /// the recovery scan on a first boot.
    pub async fn has_history(&self) -> LedgerResult<bool> {
        Ok(!self.store.is_empty().await?)
    }

    async fn revert_records(&self, records: &[ForkRecord]) -> LedgerResult<()> {
        for record in records {
            if !record.stack.is_empty() {
                info!(block_num = record.block_num, "Reverting block");
                for item in record.stack.iter().rev() {
                    self.apply_undo(item).await?;
                }
            }
            self.store.delete(record.block_num).await?;
        }

        if let Some(observer) = &self.observer {
            observer.after_revert(records).await;
        }
        Ok(())
    }

    async fn apply_undo(&self, item: &UndoItem) -> LedgerResult<()> {
        if let Some(hook) = self.hooks.get(&item.collection) {
            return hook.apply_undo(item, self.resolver.as_ref()).await;
        }

        let gateway =
            self.resolver
                .resolve(&item.collection)
                .ok_or_else(|| LedgerError::UnknownCollection {
                    collection: item.collection.clone(),
                })?;

        let snapshot = || item.prior.clone().unwrap_or(Value::Object(Default::default()));
        match item.kind {
            UndoKind::Create => gateway.remove(&item.entity_id).await?,
            UndoKind::Update => gateway.update(&item.entity_id, snapshot()).await?,
            UndoKind::Remove => gateway.create(&item.entity_id, snapshot()).await?,
        }
        Ok(())
    }
}
