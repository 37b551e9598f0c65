//! # Pipeline Integration Flows
//!
//! Exercises the full path a production deployment runs: messages published
//! to the broker topics flow through the ingestion pipeline into the
//! ledger-backed consumer, which materializes one header document per
//! delivered block.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use node_runtime::{NodeConfig, NodeRuntime, BLOCKS_COLLECTION};
    use serde_json::json;
    use shared_bus::Topic;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn spawn_runtime(config: NodeConfig) -> (Arc<NodeRuntime>, JoinHandle<anyhow::Result<()>>) {
        let runtime = Arc::new(NodeRuntime::new(config));
        let task = tokio::spawn({
            let runtime = Arc::clone(&runtime);
            async move { runtime.run().await }
        });
        (runtime, task)
    }

    fn publish_trx(runtime: &NodeRuntime, trx_id: &str) {
        runtime.broker().publish_json(
            Topic::ApplyTrx,
            &json!({
                "id": trx_id,
                "actions": [{"code": "token", "action": "transfer", "data": ""}],
            }),
        );
    }

    fn publish_accept(runtime: &NodeRuntime, block_num: u64, id: &str, trx_ids: &[&str]) {
        let trxs: Vec<_> = trx_ids.iter().map(|id| json!({"id": id})).collect();
        runtime.broker().publish_json(
            Topic::AcceptBlock,
            &json!({
                "validated": true,
                "id": id,
                "block_num": block_num,
                "block_time": Utc::now(),
                "trxs": trxs,
            }),
        );
    }

    fn publish_commit(runtime: &NodeRuntime, block_num: u64) {
        runtime
            .broker()
            .publish_json(Topic::CommitBlock, &json!({"block_num": block_num}));
    }

    /// Poll until the consumer has materialized the block's header document.
    async fn wait_for_block(runtime: &NodeRuntime, id: &str) {
        let blocks = runtime.registry().collection(BLOCKS_COLLECTION);
        timeout(Duration::from_secs(5), async {
            while blocks.document(id).is_none() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("block {id} was never delivered"));
    }

    // =========================================================================
    // DELIVERY FLOWS
    // =========================================================================

    #[tokio::test]
    async fn staged_transactions_arrive_inside_their_block() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        publish_trx(&runtime, "t1");
        publish_trx(&runtime, "t2");
        publish_accept(&runtime, 1, "b1", &["t1", "t2"]);

        wait_for_block(&runtime, "b1").await;
        let doc = runtime
            .registry()
            .collection(BLOCKS_COLLECTION)
            .document("b1")
            .unwrap();
        assert_eq!(doc["block_num"], 1);
        assert_eq!(doc["trx_count"], 2);
        assert_eq!(doc["missing_trx_count"], 0);

        task.abort();
    }

    #[tokio::test]
    async fn redelivered_accept_is_processed_once() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        // Broker replay redelivers b1; the duplicate filter must swallow it,
        // otherwise the consumer's create conflict kills the pipeline.
        publish_accept(&runtime, 1, "b1", &[]);
        publish_accept(&runtime, 1, "b1", &[]);
        publish_accept(&runtime, 2, "b2", &[]);

        wait_for_block(&runtime, "b2").await;
        assert_eq!(runtime.registry().collection(BLOCKS_COLLECTION).len(), 2);

        task.abort();
    }

    #[tokio::test]
    async fn defective_first_block_is_skipped_once() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        // The replay window opened mid-block: b1 references a transaction
        // that was announced before the subscription existed.
        publish_accept(&runtime, 1, "b1", &["never-seen"]);
        publish_accept(&runtime, 2, "b2", &[]);

        wait_for_block(&runtime, "b2").await;
        let blocks = runtime.registry().collection(BLOCKS_COLLECTION);
        assert!(blocks.document("b1").is_none());

        task.abort();
    }

    #[tokio::test]
    async fn later_blocks_with_missing_transactions_still_deliver() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        publish_accept(&runtime, 1, "b1", &[]);
        publish_accept(&runtime, 2, "b2", &["lost"]);

        wait_for_block(&runtime, "b2").await;
        let doc = runtime
            .registry()
            .collection(BLOCKS_COLLECTION)
            .document("b2")
            .unwrap();
        assert_eq!(doc["missing_trx_count"], 1);

        task.abort();
    }

    // =========================================================================
    // IRREVERSIBILITY
    // =========================================================================

    #[tokio::test]
    async fn holdback_releases_only_committed_blocks() {
        let mut config = NodeConfig::default();
        config.subscribe.only_irreversible = true;
        let (runtime, task) = spawn_runtime(config);

        publish_accept(&runtime, 1, "b1", &[]);
        publish_accept(&runtime, 2, "b2", &[]);
        publish_accept(&runtime, 3, "b3", &[]);
        publish_commit(&runtime, 2);

        wait_for_block(&runtime, "b2").await;
        let blocks = runtime.registry().collection(BLOCKS_COLLECTION);
        assert!(blocks.document("b1").is_some());
        assert!(blocks.document("b3").is_none());

        publish_commit(&runtime, 3);
        wait_for_block(&runtime, "b3").await;

        task.abort();
    }

    #[tokio::test]
    async fn commit_prunes_ledger_below_watermark() {
        // Wired by hand so the test keeps a handle on the record store.
        let broker = Arc::new(shared_bus::InMemoryBroker::new());
        let store = Arc::new(fork_ledger::adapters::InMemoryForkStore::new());
        let registry = Arc::new(fork_ledger::adapters::InMemoryEntityRegistry::new());
        let ledger = Arc::new(fork_ledger::ForkLedger::new(
            Arc::clone(&store),
            Arc::clone(&registry) as Arc<dyn fork_ledger::EntityResolver>,
        ));
        let sink = Arc::new(node_runtime::LedgerBlockHandler::new(
            ledger,
            Arc::clone(&registry),
        ));
        let service = Arc::new(block_subscribe::BlockSubscribeService::new(
            block_subscribe::SubscribeConfig::default(),
            Arc::clone(&broker),
            sink,
        ));
        let task = tokio::spawn(Arc::clone(&service).run());

        for n in 1u64..=5 {
            broker.publish_json(
                Topic::AcceptBlock,
                &json!({
                    "validated": true,
                    "id": format!("b{n}"),
                    "block_num": n,
                    "block_time": Utc::now(),
                    "trxs": [],
                }),
            );
        }
        let blocks = registry.collection(BLOCKS_COLLECTION);
        timeout(Duration::from_secs(5), async {
            while blocks.document("b5").is_none() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("b5 was never delivered");

        broker.publish_json(Topic::CommitBlock, &json!({"block_num": 5}));

        // Pruning runs on a spawned task; poll for its effect.
        timeout(Duration::from_secs(5), async {
            while store.contains(3) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("records below the watermark were never pruned");

        // The watermark - 1 safety anchor survives.
        assert!(store.contains(4));
        assert!(store.contains(5));

        task.abort();
    }

    // =========================================================================
    // FATAL CONDITIONS
    // =========================================================================

    #[tokio::test]
    async fn malformed_message_is_fatal() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        runtime
            .broker()
            .publish(Topic::AcceptBlock, b"not json".to_vec());

        let result = timeout(Duration::from_secs(5), task)
            .await
            .expect("pipeline should have terminated")
            .expect("task should not panic");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn broker_shutdown_terminates_the_pipeline() {
        let (runtime, task) = spawn_runtime(NodeConfig::default());

        publish_accept(&runtime, 1, "b1", &[]);
        wait_for_block(&runtime, "b1").await;

        runtime.shutdown();

        let result = timeout(Duration::from_secs(5), task)
            .await
            .expect("pipeline should have terminated")
            .expect("task should not panic");
        assert!(result.is_err());
    }
}
