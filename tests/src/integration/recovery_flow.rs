//! # Fork and Crash Recovery Flows
//!
//! Exercises the ledger's revert machinery through the same wiring the node
//! runtime uses: a fork rolls consumer documents back out, and a restart
//! after an unclean shutdown reverts the unfinalized tail and resumes
//! delivery past the recovered cursor.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use block_subscribe::{BlockSubscribeService, SubscribeConfig};
    use chrono::Utc;
    use fork_ledger::adapters::{InMemoryEntityRegistry, InMemoryForkStore};
    use fork_ledger::{BlockRef, EntityGateway, EntityResolver, ForkLedger, LedgerError};
    use node_runtime::{LedgerBlockHandler, BLOCKS_COLLECTION};
    use serde_json::json;
    use shared_bus::{InMemoryBroker, Topic};
    use tokio::time::{sleep, timeout};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Deployment {
        broker: Arc<InMemoryBroker>,
        store: Arc<InMemoryForkStore>,
        registry: Arc<InMemoryEntityRegistry>,
        ledger: Arc<ForkLedger<InMemoryForkStore>>,
        service: Arc<BlockSubscribeService<InMemoryBroker, LedgerBlockHandler>>,
    }

    /// Wire a fresh pipeline over possibly pre-existing store and registry,
    /// the shape of a process (re)start against durable state.
    fn deploy(
        store: Arc<InMemoryForkStore>,
        registry: Arc<InMemoryEntityRegistry>,
    ) -> Deployment {
        let broker = Arc::new(InMemoryBroker::new());
        let ledger = Arc::new(ForkLedger::new(
            Arc::clone(&store),
            Arc::clone(&registry) as Arc<dyn EntityResolver>,
        ));
        let sink = Arc::new(LedgerBlockHandler::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
        ));
        let service = Arc::new(BlockSubscribeService::new(
            SubscribeConfig::default(),
            Arc::clone(&broker),
            sink,
        ));
        Deployment {
            broker,
            store,
            registry,
            ledger,
            service,
        }
    }

    fn publish_accept(broker: &InMemoryBroker, block_num: u64, id: &str) {
        broker.publish_json(
            Topic::AcceptBlock,
            &json!({
                "validated": true,
                "id": id,
                "block_num": block_num,
                "block_time": Utc::now(),
                "trxs": [],
            }),
        );
    }

    async fn wait_for_block(deployment: &Deployment, id: &str) {
        let blocks = deployment.registry.collection(BLOCKS_COLLECTION);
        timeout(Duration::from_secs(5), async {
            while blocks.document(id).is_none() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("block {id} was never delivered"));
    }

    // =========================================================================
    // FORK REVERTS
    // =========================================================================

    #[tokio::test]
    async fn fork_rolls_consumer_documents_back_out() {
        let deployment = deploy(
            Arc::new(InMemoryForkStore::new()),
            Arc::new(InMemoryEntityRegistry::new()),
        );
        let task = tokio::spawn(Arc::clone(&deployment.service).run());

        for n in 1u64..=3 {
            publish_accept(&deployment.broker, n, &format!("b{n}"));
        }
        wait_for_block(&deployment, "b3").await;
        task.abort();

        // The chain forked after block 1.
        deployment.ledger.revert(1).await.unwrap();

        let blocks = deployment.registry.collection(BLOCKS_COLLECTION);
        assert!(blocks.document("b1").is_some());
        assert!(blocks.document("b2").is_none());
        assert!(blocks.document("b3").is_none());
        assert!(deployment.store.contains(1));
        assert!(!deployment.store.contains(2));
    }

    #[tokio::test]
    async fn revert_to_unknown_base_changes_nothing() {
        let deployment = deploy(
            Arc::new(InMemoryForkStore::new()),
            Arc::new(InMemoryEntityRegistry::new()),
        );
        let task = tokio::spawn(Arc::clone(&deployment.service).run());

        for n in 5u64..=6 {
            publish_accept(&deployment.broker, n, &format!("b{n}"));
        }
        wait_for_block(&deployment, "b6").await;
        task.abort();

        let err = deployment.ledger.revert(2).await.unwrap_err();
        assert!(matches!(err, LedgerError::BaseBlockMissing { base: 2 }));
        assert_eq!(deployment.store.len(), 2);
        assert_eq!(
            deployment.registry.collection(BLOCKS_COLLECTION).len(),
            2
        );
    }

    // =========================================================================
    // CRASH RECOVERY ACROSS RESTARTS
    // =========================================================================

    #[tokio::test]
    async fn restart_reverts_unfinalized_tail_and_resumes_past_cursor() {
        let store = Arc::new(InMemoryForkStore::new());
        let registry = Arc::new(InMemoryEntityRegistry::new());

        // First run: blocks 1 and 2 land cleanly.
        let first = deploy(Arc::clone(&store), Arc::clone(&registry));
        let task = tokio::spawn(Arc::clone(&first.service).run());
        publish_accept(&first.broker, 1, "b1");
        publish_accept(&first.broker, 2, "b2");
        wait_for_block(&first, "b2").await;
        task.abort();

        // The process dies mid block 3: the record exists, a document was
        // created, but the frame never finalized.
        let _ = first
            .ledger
            .wrap_block(
                BlockRef {
                    block_num: 3,
                    block_time: Utc::now(),
                    sequence: 3,
                },
                || async {
                    let blocks = registry.collection(BLOCKS_COLLECTION);
                    blocks.create("b3", json!({"block_num": 3})).await?;
                    first
                        .ledger
                        .register_changes(fork_ledger::ChangeSet {
                            kind: fork_ledger::UndoKind::Create,
                            collection: BLOCKS_COLLECTION.to_owned(),
                            entity_id: "b3".to_owned(),
                            prior: None,
                        })
                        .await?;
                    anyhow::bail!("power loss")
                },
            )
            .await;
        assert!(registry
            .collection(BLOCKS_COLLECTION)
            .document("b3")
            .is_some());

        // Second run over the same durable state.
        let second = deploy(Arc::clone(&store), Arc::clone(&registry));
        let cursor = second
            .ledger
            .revert_unfinalized_blocks()
            .await
            .unwrap()
            .expect("the crashed block should have been reverted");
        assert_eq!(cursor.block_num, 2);
        assert!(registry
            .collection(BLOCKS_COLLECTION)
            .document("b3")
            .is_none());

        second.service.set_resume_cursor(cursor);
        let task = tokio::spawn(Arc::clone(&second.service).run());

        // Broker replay redelivers everything; only block 3 may reach the
        // consumer again, or its create conflict would kill the pipeline.
        publish_accept(&second.broker, 1, "b1");
        publish_accept(&second.broker, 2, "b2");
        publish_accept(&second.broker, 3, "b3");
        wait_for_block(&second, "b3").await;
        task.abort();

        assert_eq!(store.record(3).unwrap().finalized, Some(true));
        assert_eq!(registry.collection(BLOCKS_COLLECTION).len(), 3);
    }

    #[tokio::test]
    async fn clean_restart_reverts_nothing() {
        let store = Arc::new(InMemoryForkStore::new());
        let registry = Arc::new(InMemoryEntityRegistry::new());

        let first = deploy(Arc::clone(&store), Arc::clone(&registry));
        let task = tokio::spawn(Arc::clone(&first.service).run());
        publish_accept(&first.broker, 1, "b1");
        wait_for_block(&first, "b1").await;
        task.abort();

        let second = deploy(Arc::clone(&store), Arc::clone(&registry));
        assert!(second
            .ledger
            .revert_unfinalized_blocks()
            .await
            .unwrap()
            .is_none());
        assert!(registry
            .collection(BLOCKS_COLLECTION)
            .document("b1")
            .is_some());
    }
}
