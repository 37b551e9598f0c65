//! # chainfeed node runtime
//!
//! Wires the three moving parts together and supervises them:
//!
//! - `shared-bus` broker carrying the ApplyTrx / AcceptBlock / CommitBlock
//!   topics,
//! - `block-subscribe` ingestion pipeline assembling and delivering blocks,
//! - `fork-ledger` consuming delivered blocks behind a
//!   [`BlockSink`](block_subscribe::BlockSink).
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Build the broker, ledger, and pipeline
//! 3. Run crash recovery against the ledger (skipped on a first boot)
//! 4. Resume ingestion from the recovered cursor
//! 5. Run the pipeline until a fatal error or shutdown signal
//!
//! Fatal pipeline errors propagate out of [`NodeRuntime::run`]; the process
//! exits nonzero and relies on its supervisor to restart it, at which point
//! the recovery scan reconciles whatever the crash left behind.

pub mod config;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use block_subscribe::BlockSubscribeService;
use fork_ledger::adapters::{InMemoryEntityRegistry, InMemoryForkStore};
use fork_ledger::{EntityResolver, ForkLedger, LedgerError};
use shared_bus::InMemoryBroker;
use tracing::{info, warn};

pub use config::{load_config, BrokerConfig, NodeConfig};
pub use handlers::{LedgerBlockHandler, BLOCKS_COLLECTION};

/// The assembled node: broker, pipeline, and ledger.
pub struct NodeRuntime {
    broker: Arc<InMemoryBroker>,
    ledger: Arc<ForkLedger<InMemoryForkStore>>,
    registry: Arc<InMemoryEntityRegistry>,
    service: Arc<BlockSubscribeService<InMemoryBroker, LedgerBlockHandler>>,
}

impl NodeRuntime {
    /// Build the node from configuration.
    pub fn new(config: NodeConfig) -> Self {
        info!("Creating chainfeed node runtime");

        let broker = Arc::new(InMemoryBroker::with_retention_ms(
            config.broker.retention_ms,
        ));
        let store = Arc::new(InMemoryForkStore::new());
        let registry = Arc::new(InMemoryEntityRegistry::new());
        let ledger = Arc::new(ForkLedger::new(
            store,
            Arc::clone(&registry) as Arc<dyn EntityResolver>,
        ));
        let sink = Arc::new(LedgerBlockHandler::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
        ));
        let service = Arc::new(BlockSubscribeService::new(
            config.subscribe,
            Arc::clone(&broker),
            sink,
        ));

        Self {
            broker,
            ledger,
            registry,
            service,
        }
    }

    /// Run crash recovery, then the ingestion pipeline, until it fails.
    pub async fn run(&self) -> Result<()> {
        self.recover().await?;

        info!("Starting block ingestion");
        Arc::clone(&self.service)
            .run()
            .await
            .context("block ingestion pipeline failed")
    }

    /// Reconcile the ledger after an unclean shutdown.
    ///
    /// A first boot finds an empty ledger and starts clean. Otherwise any
    /// unfinalized tail is reverted and ingestion resumes from the newest
    /// finalized block.
    async fn recover(&self) -> Result<()> {
        if !self.ledger.has_history().await? {
            info!("Ledger is empty, starting from a clean state");
            return Ok(());
        }

        match self.ledger.revert_unfinalized_blocks().await {
            Ok(Some(cursor)) => {
                info!(
                    block_num = cursor.block_num,
                    sequence = cursor.sequence,
                    "Recovered from unclean shutdown, resuming"
                );
                self.service.set_resume_cursor(cursor);
            }
            Ok(None) => {
                info!("Clean shutdown detected, nothing to revert");
            }
            Err(err @ LedgerError::EmptyLedger) => {
                // has_history raced a concurrent prune; treat as first boot.
                warn!(error = %err, "Ledger emptied during recovery");
            }
            Err(err) => return Err(err).context("crash recovery failed"),
        }
        Ok(())
    }

    /// The broker upstream producers publish into.
    pub fn broker(&self) -> Arc<InMemoryBroker> {
        Arc::clone(&self.broker)
    }

    /// The ledger backing the block consumer.
    pub fn ledger(&self) -> Arc<ForkLedger<InMemoryForkStore>> {
        Arc::clone(&self.ledger)
    }

    /// The entity registry the consumer materializes into.
    pub fn registry(&self) -> Arc<InMemoryEntityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Shut the broker down, ending the pipeline with a fatal
    /// connection-closed error.
    pub fn shutdown(&self) {
        info!("Shutting down");
        self.broker.close();
    }
}
