//! Block ingestion service.
//!
//! One instance owns all pipeline state. Handlers run on a single logical
//! task and suspend only at explicit yield points, so no handler ever
//! observes another's partially applied state.

use crate::config::SubscribeConfig;
use crate::domain::{DeliveryQueue, DuplicateFilter, HoldbackQueue, StagingBuffer};
use crate::error::{SubscribeError, SubscribeResult};
use crate::ports::BlockSink;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use shared_bus::{BlockBroker, BrokerMessage, ReplayWindow, Topic};
use shared_types::messages::{BlockAccept, BlockCommit, TransactionApply, TrxAction};
use shared_types::{AssembledBlock, ResumeCursor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Mutable pipeline state, owned exclusively by the service.
struct PipelineState {
    staging: StagingBuffer,
    handled: DuplicateFilter,
    delivery: DeliveryQueue,
    holdback: HoldbackQueue,
    /// Latest accepted block number; `None` until the first accept message.
    current_block_num: Option<u64>,
    /// Set until the first accept message has been processed. The defective
    /// first block (bootstrap race with the replay window) is skipped once
    /// per process lifetime, never again.
    awaiting_first_block: bool,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            staging: StagingBuffer::default(),
            handled: DuplicateFilter::default(),
            delivery: DeliveryQueue::default(),
            holdback: HoldbackQueue::default(),
            current_block_num: None,
            awaiting_first_block: true,
        }
    }
}

/// The block ingestion pipeline.
///
/// Generic over the broker transport `B` and the consumer sink `S`, both
/// injected at construction so tests run fully in memory.
pub struct BlockSubscribeService<B, S>
where
    B: BlockBroker,
    S: BlockSink,
{
    config: SubscribeConfig,
    broker: Arc<B>,
    sink: Arc<S>,
    state: Mutex<PipelineState>,
    /// Blocks below this number are skipped by the notifier. Starts at the
    /// configured floor; raised by the recovery resume cursor.
    delivery_floor: AtomicU64,
}

impl<B, S> BlockSubscribeService<B, S>
where
    B: BlockBroker + 'static,
    S: BlockSink + 'static,
{
    /// Create a pipeline.
    pub fn new(config: SubscribeConfig, broker: Arc<B>, sink: Arc<S>) -> Self {
        let floor = config.start_from_block;
        Self {
            config,
            broker,
            sink,
            state: Mutex::new(PipelineState::new()),
            delivery_floor: AtomicU64::new(floor),
        }
    }

    /// Resume after the crash-recovery scan: deliver only blocks strictly
    /// after the last finalized one.
    pub fn set_resume_cursor(&self, cursor: ResumeCursor) {
        let floor = self
            .config
            .start_from_block
            .max(cursor.block_num.saturating_add(1));
        self.delivery_floor.store(floor, Ordering::SeqCst);
        info!(
            block_num = cursor.block_num,
            sequence = cursor.sequence,
            "Resume cursor applied"
        );
    }

    /// Run the pipeline until a fatal error.
    ///
    /// Opens a single subscription over the three topics, starts the notifier
    /// and sweep tasks, and dispatches broker messages one at a time in their
    /// publish order. A per-topic subscription each would lose cross-topic
    /// ordering and let an accept overtake the apply messages that fill its
    /// block. Returns only on fatal conditions; the caller (supervisor)
    /// terminates the process.
    pub async fn run(self: Arc<Self>) -> SubscribeResult<()> {
        let replay = ReplayWindow::last(self.config.replay_time_delta);
        let mut messages = self
            .broker
            .subscribe(&Topic::ALL, replay)
            .await
            .map_err(|_| SubscribeError::ConnectionClosed)?;

        let mut notifier = tokio::spawn(Arc::clone(&self).notifier_loop());
        let sweeper = tokio::spawn(Arc::clone(&self).sweep_loop());

        let result = loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => {
                        if let Err(err) = self.dispatch(&message) {
                            break Err(err);
                        }
                    }
                    None => break Err(SubscribeError::ConnectionClosed),
                },
                joined = &mut notifier => {
                    break match joined {
                        Ok(Err(err)) => Err(err),
                        _ => Err(SubscribeError::NotifierAborted),
                    };
                }
            }
        };

        notifier.abort();
        sweeper.abort();
        result
    }

    /// Route one broker message to its topic's handler.
    fn dispatch(&self, message: &BrokerMessage) -> SubscribeResult<()> {
        match message.topic {
            Topic::ApplyTrx => self.handle_transaction_apply(message),
            Topic::AcceptBlock => self.handle_block_accept(message),
            Topic::CommitBlock => self.handle_block_commit(message),
        }
    }

    /// Handle an `ApplyTrx` message: strip payload-bearing actions and stage
    /// the transaction until its block arrives.
    pub fn handle_transaction_apply(&self, message: &BrokerMessage) -> SubscribeResult<()> {
        let mut transaction: TransactionApply = parse(Topic::ApplyTrx, message)?;
        transaction.actions.retain(TrxAction::is_structural);

        let mut state = self.state.lock();
        let current = state.current_block_num;
        state.staging.insert(transaction, current);
        Ok(())
    }

    /// Handle an `AcceptBlock` message: assemble the block from staging and
    /// enqueue it for delivery (or holdback).
    pub fn handle_block_accept(&self, message: &BrokerMessage) -> SubscribeResult<()> {
        let raw: BlockAccept = parse(Topic::AcceptBlock, message)?;

        let mut state = self.state.lock();
        if !raw.validated {
            debug!(block_num = raw.block_num, "Ignoring unvalidated block");
            return Ok(());
        }
        if state.handled.contains(&raw.id) {
            debug!(block_num = raw.block_num, "Ignoring redelivered block");
            return Ok(());
        }

        state.current_block_num = Some(raw.block_num);

        let transactions = state.staging.extract(&raw.trxs);

        if state.awaiting_first_block {
            state.awaiting_first_block = false;
            if transactions.iter().any(Option::is_none) {
                // Bootstrap race: the replay window can start mid-block, so
                // the first block's transactions may predate our subscription.
                warn!(
                    block_num = raw.block_num,
                    "Skipping defective first block from bootstrap race"
                );
                return Ok(());
            }
        }

        for (position, slot) in transactions.iter().enumerate() {
            if slot.is_none() {
                error!(
                    block_num = raw.block_num,
                    trx_id = %raw.trxs[position].id,
                    "Referenced transaction missing from staging buffer"
                );
            }
        }

        let assembled = AssembledBlock {
            id: raw.id.clone(),
            block_num: raw.block_num,
            block_time: raw.block_time,
            sequence: message.sequence,
            transactions,
        };

        if self.config.only_irreversible {
            state.holdback.push(assembled);
        } else {
            state.delivery.push(assembled);
        }
        state.handled.insert(raw.id, raw.block_num);
        Ok(())
    }

    /// Handle a `CommitBlock` message.
    ///
    /// Synchronous by design: it must never suspend, so it cannot interleave
    /// with a concurrent accept handler's partial state.
    pub fn handle_block_commit(&self, message: &BrokerMessage) -> SubscribeResult<()> {
        let commit: BlockCommit = parse(Topic::CommitBlock, message)?;

        self.sink.irreversible_block_num(commit.block_num);

        if self.config.only_irreversible {
            let mut state = self.state.lock();
            let released = state.holdback.release_upto(commit.block_num);
            if !released.is_empty() {
                debug!(
                    watermark = commit.block_num,
                    released = released.len(),
                    "Released held blocks"
                );
            }
            state.delivery.extend(released);
        }
        Ok(())
    }

    /// Drain the delivery queue forever, yielding between drain cycles.
    async fn notifier_loop(self: Arc<Self>) -> SubscribeResult<()> {
        loop {
            while let Some(block) = self.pop_delivery() {
                let floor = self.delivery_floor.load(Ordering::SeqCst);
                if block.block_num < floor {
                    info!(block_num = block.block_num, "Skip outdated block");
                    continue;
                }
                let block_num = block.block_num;
                self.sink
                    .block(block)
                    .await
                    .map_err(|source| SubscribeError::ConsumerFailure { block_num, source })?;
            }
            tokio::task::yield_now().await;
        }
    }

    fn pop_delivery(&self) -> Option<AssembledBlock> {
        self.state.lock().delivery.pop()
    }

    /// Sweep the duplicate filter and staging buffer on a fixed interval.
    ///
    /// Failures here only affect memory hygiene, never the delivered stream,
    /// so the loop never returns an error.
    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately and would sweep an empty filter.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.sweep_once().await;
        }
    }

    /// One sweep pass, yielding cooperatively between entries.
    pub async fn sweep_once(&self) {
        let Some(current) = self.state.lock().current_block_num else {
            return;
        };
        let threshold = current.saturating_sub(self.config.retention_window);

        let handled_ids = self.state.lock().handled.ids();
        let mut pruned = 0usize;
        for block_id in handled_ids {
            if self.state.lock().handled.prune_if_older(&block_id, threshold) {
                pruned += 1;
            }
            tokio::task::yield_now().await;
        }

        let staged_ids = self.state.lock().staging.ids();
        let mut orphaned = 0usize;
        for trx_id in staged_ids {
            if self.state.lock().staging.prune_if_older(&trx_id, threshold) {
                orphaned += 1;
            }
            tokio::task::yield_now().await;
        }

        if pruned > 0 || orphaned > 0 {
            debug!(pruned, orphaned, threshold, "Sweep complete");
        }
    }

    /// Queue depths, exposed for tests and runtime introspection.
    #[must_use]
    pub fn queue_depths(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.delivery.len(), state.holdback.len())
    }

    /// Number of staged transactions.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.state.lock().staging.len()
    }

    /// Number of remembered block ids in the duplicate filter.
    #[must_use]
    pub fn handled_count(&self) -> usize {
        self.state.lock().handled.len()
    }
}

fn parse<T: DeserializeOwned>(topic: Topic, message: &BrokerMessage) -> SubscribeResult<T> {
    serde_json::from_slice(&message.payload)
        .map_err(|source| SubscribeError::MalformedMessage { topic, source })
}
