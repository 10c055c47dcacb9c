use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::blockchain::registry::SubscriptionRegistry;
use crate::blockchain::rpc_client::NodeClient;
use crate::blockchain::tx_index::TransactionIndex;
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{Address, Block, Transaction};

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The node has nothing newer than the cursor
    Idle { cursor: u64 },
    /// The block at `to` was fetched and distributed; blocks strictly between
    /// `from` and `to` were skipped
    Advanced { from: u64, to: u64, matched: usize },
}

/// Owns the subscription registry, the transaction index and the cursor.
///
/// Built once at startup and shared behind an `Arc` by the block monitor and
/// the HTTP handlers.
pub struct IndexingEngine<C: NodeClient> {
    client: C,
    registry: SubscriptionRegistry,
    index: TransactionIndex,
    cursor: AtomicU64,
    // Serializes ticks so two advances can never overlap
    advance_lock: Mutex<()>,
}

impl<C: NodeClient> IndexingEngine<C> {
    /// Create an engine whose cursor is the node's current block number.
    ///
    /// Fails when the node cannot be reached; the caller should treat that as fatal.
    pub async fn start(client: C) -> Result<Self, RpcError> {
        let cursor = client.get_latest_block_number().await?;

        LogContext::new("engine", "start")
            .with_block_number(cursor)
            .info(&format!("Cursor primed at block {}", cursor));

        Ok(Self::with_cursor(client, cursor))
    }

    pub fn with_cursor(client: C, cursor: u64) -> Self {
        Self {
            client,
            registry: SubscriptionRegistry::new(),
            index: TransactionIndex::new(),
            cursor: AtomicU64::new(cursor),
            advance_lock: Mutex::new(()),
        }
    }

    /// Watch `address`. Idempotent; returns `true` when newly added.
    pub fn subscribe(&self, address: &str) -> bool {
        let address = Address::new(address);
        let newly_added = self.registry.subscribe(address.clone());
        MetricsLogger::log_subscription(address.as_str(), newly_added, self.registry.len());
        newly_added
    }

    pub fn is_subscribed(&self, address: &str) -> bool {
        self.registry.contains(&Address::new(address))
    }

    pub fn subscriptions(&self) -> Vec<Address> {
        self.registry.snapshot()
    }

    /// Recorded transactions for `address`, oldest first.
    pub fn get_transactions(&self, address: &str) -> Vec<Transaction> {
        self.index.get(&Address::new(address))
    }

    /// Live read of the node's latest block. Does not consult the cursor.
    pub async fn get_current_block(&self) -> Result<Block, RpcError> {
        let latest = self.client.get_latest_block_number().await?;
        self.client.get_block_by_number(latest).await
    }

    /// Number of the most recently fully processed block.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn indexed_address_count(&self) -> usize {
        self.index.address_count()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Poll the node once and index the latest block if it is past the cursor.
    ///
    /// Only the newest block is fetched; any blocks between the cursor and it
    /// are skipped. On error the cursor is left untouched so the next tick
    /// retries.
    pub async fn tick(&self) -> Result<TickOutcome, RpcError> {
        let _guard = self.advance_lock.lock().await;

        let cursor = self.cursor();
        let latest = self.client.get_latest_block_number().await?;
        if latest <= cursor {
            return Ok(TickOutcome::Idle { cursor });
        }

        let block = self.client.get_block_by_number(latest).await?;
        let number = block.number_u64()?;
        if number != latest {
            return Err(RpcError::Protocol(format!(
                "requested block {} but node returned block {}",
                latest, number
            )));
        }

        let matched = self.index.distribute(&self.registry, &block.transactions);
        // Published only after the whole block is in the index
        self.cursor.store(latest, Ordering::Release);

        if latest > cursor + 1 {
            MetricsLogger::log_blocks_skipped(cursor + 1, latest - 1);
        }
        MetricsLogger::log_block_indexed(
            latest,
            block.hash(),
            block.transactions.len(),
            matched,
            self.index.entry_count(),
        );

        LogContext::new("engine", "tick")
            .with_block_number(latest)
            .with_metadata("previous_cursor", json!(cursor))
            .debug(&format!("Cursor advanced {} -> {}", cursor, latest));

        Ok(TickOutcome::Advanced {
            from: cursor,
            to: latest,
            matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// Node whose answers are scripted per call
    #[derive(Default)]
    struct ScriptedNode {
        latest: StdMutex<VecDeque<Result<u64, RpcError>>>,
        blocks: StdMutex<HashMap<u64, Block>>,
        empty_once: StdMutex<Vec<u64>>,
        fetched: StdMutex<Vec<u64>>,
    }

    impl ScriptedNode {
        fn with_latest(numbers: &[u64]) -> Self {
            let node = Self::default();
            node.latest.lock().unwrap().extend(numbers.iter().map(|n| Ok(*n)));
            node
        }

        fn add_block(&self, number: u64, transactions: Vec<Transaction>) {
            self.blocks.lock().unwrap().insert(
                number,
                Block {
                    number: format!("0x{:x}", number),
                    transactions,
                    extra: Map::new(),
                },
            );
        }

        fn fetched(&self) -> Vec<u64> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NodeClient for ScriptedNode {
        async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
            self.latest
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RpcError::Transport("script exhausted".to_string())))
        }

        async fn get_block_by_number(&self, number: u64) -> Result<Block, RpcError> {
            self.fetched.lock().unwrap().push(number);
            let mut empty_once = self.empty_once.lock().unwrap();
            if let Some(pos) = empty_once.iter().position(|n| *n == number) {
                empty_once.remove(pos);
                return Err(RpcError::EmptyResult { block_number: number });
            }
            self.blocks
                .lock()
                .unwrap()
                .get(&number)
                .cloned()
                .ok_or(RpcError::EmptyResult { block_number: number })
        }
    }

    fn tx(hash: &str, from: &str, to: &str, block: u64) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: from.to_string(),
            to: Some(to.to_string()),
            block_number: format!("0x{:x}", block),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_start_primes_cursor() {
        let engine = IndexingEngine::start(ScriptedNode::with_latest(&[5])).await.unwrap();
        assert_eq!(engine.cursor(), 5);
        assert!(engine.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_start_fails_without_node() {
        let result = IndexingEngine::start(ScriptedNode::default()).await;
        assert!(matches!(result, Err(RpcError::Transport(_))));
    }

    #[tokio::test]
    async fn test_idle_tick_keeps_cursor() {
        let node = ScriptedNode::with_latest(&[5, 4]);
        let engine = IndexingEngine::with_cursor(node, 5);

        assert_eq!(engine.tick().await.unwrap(), TickOutcome::Idle { cursor: 5 });
        // A node that briefly reports an older number never moves the cursor back
        assert_eq!(engine.tick().await.unwrap(), TickOutcome::Idle { cursor: 5 });
        assert_eq!(engine.cursor(), 5);
        assert!(engine.client.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_single_block() {
        let node = ScriptedNode::with_latest(&[5, 6]);
        node.add_block(6, vec![tx("0xt1", "0xaaa", "0xbbb", 6)]);

        let engine = IndexingEngine::start(node).await.unwrap();
        assert_eq!(engine.cursor(), 5);

        assert!(engine.subscribe("0xaaa"));
        let outcome = engine.tick().await.unwrap();

        assert_eq!(outcome, TickOutcome::Advanced { from: 5, to: 6, matched: 1 });
        assert_eq!(engine.cursor(), 6);

        let recorded = engine.get_transactions("0xaaa");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].hash, "0xt1");
        assert!(engine.get_transactions("0xbbb").is_empty());
    }

    #[tokio::test]
    async fn test_jump_only_indexes_latest_block() {
        let node = ScriptedNode::with_latest(&[9]);
        for n in 6..=8 {
            node.add_block(n, vec![tx(&format!("0xskipped{}", n), "0xaaa", "0xccc", n)]);
        }
        node.add_block(9, vec![tx("0xlatest", "0xaaa", "0xccc", 9)]);

        let engine = IndexingEngine::with_cursor(node, 5);
        engine.subscribe("0xaaa");

        let outcome = engine.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Advanced { from: 5, to: 9, matched: 1 });
        assert_eq!(engine.client.fetched(), vec![9]);

        let hashes: Vec<String> = engine.get_transactions("0xaaa").into_iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec!["0xlatest"]);
    }

    #[tokio::test]
    async fn test_cursor_is_monotonic() {
        let node = ScriptedNode::with_latest(&[6, 6, 8, 8, 7, 10]);
        for n in [6, 8, 10] {
            node.add_block(n, vec![]);
        }

        let engine = IndexingEngine::with_cursor(node, 5);
        let mut previous = engine.cursor();
        let mut advances = 0;

        for _ in 0..6 {
            if let TickOutcome::Advanced { .. } = engine.tick().await.unwrap() {
                advances += 1;
            }
            assert!(engine.cursor() >= previous);
            previous = engine.cursor();
        }

        assert_eq!(advances, 3);
        assert_eq!(engine.cursor(), 10);
        assert_eq!(engine.client.fetched(), vec![6, 8, 10]);
    }

    #[tokio::test]
    async fn test_empty_result_is_retried_next_tick() {
        let node = ScriptedNode::with_latest(&[6, 7, 7]);
        node.add_block(6, vec![tx("0xt6", "0xaaa", "0xbbb", 6)]);
        node.add_block(7, vec![tx("0xt7", "0xbbb", "0xaaa", 7)]);
        node.empty_once.lock().unwrap().push(7);

        let engine = IndexingEngine::with_cursor(node, 5);
        engine.subscribe("0xaaa");

        engine.tick().await.unwrap();
        assert_eq!(engine.cursor(), 6);

        let err = engine.tick().await.unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult { block_number: 7 }));
        assert_eq!(engine.cursor(), 6);
        assert_eq!(engine.get_transactions("0xaaa").len(), 1);

        let outcome = engine.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Advanced { from: 6, to: 7, matched: 1 });
        assert_eq!(engine.client.fetched(), vec![6, 7, 7]);

        let hashes: Vec<String> = engine.get_transactions("0xaaa").into_iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec!["0xt6", "0xt7"]);
    }

    #[tokio::test]
    async fn test_mismatched_block_number_does_not_advance() {
        let node = ScriptedNode::with_latest(&[6]);
        node.blocks.lock().unwrap().insert(
            6,
            Block {
                number: "0x7".to_string(),
                transactions: vec![],
                extra: Map::new(),
            },
        );

        let engine = IndexingEngine::with_cursor(node, 5);
        assert!(matches!(engine.tick().await, Err(RpcError::Protocol(_))));
        assert_eq!(engine.cursor(), 5);
    }

    #[tokio::test]
    async fn test_case_insensitive_queries() {
        let node = ScriptedNode::with_latest(&[6]);
        node.add_block(6, vec![tx("0xt1", "0xabcdef", "0x0123", 6)]);

        let engine = IndexingEngine::with_cursor(node, 5);
        engine.subscribe("0xABCDEF");
        engine.tick().await.unwrap();

        assert!(engine.is_subscribed("0xabcdef"));
        assert_eq!(engine.get_transactions("0xabcdef"), engine.get_transactions("0xABCDEF"));
        assert_eq!(engine.get_transactions("0xAbCdEf").len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let engine = IndexingEngine::with_cursor(ScriptedNode::default(), 0);

        assert!(engine.subscribe("0xaaa"));
        assert!(!engine.subscribe("0xaaa"));
        assert_eq!(engine.subscriptions(), vec![Address::new("0xaaa")]);
    }

    #[tokio::test]
    async fn test_unsubscribed_query_is_empty() {
        let engine = IndexingEngine::with_cursor(ScriptedNode::default(), 0);
        assert!(engine.get_transactions("0xaaa").is_empty());
        assert!(engine.get_transactions("").is_empty());
        assert_eq!(engine.indexed_address_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_only_affects_later_blocks() {
        let node = ScriptedNode::with_latest(&[6, 7]);
        node.add_block(6, vec![tx("0xt6", "0xaaa", "0xbbb", 6)]);
        node.add_block(7, vec![tx("0xt7", "0xaaa", "0xbbb", 7)]);

        let engine = IndexingEngine::with_cursor(node, 5);
        engine.tick().await.unwrap();
        engine.subscribe("0xbbb");
        engine.tick().await.unwrap();

        let hashes: Vec<String> = engine.get_transactions("0xbbb").into_iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec!["0xt7"]);
    }

    #[tokio::test]
    async fn test_get_current_block_reads_through() {
        let node = ScriptedNode::with_latest(&[12]);
        node.add_block(12, vec![tx("0xt", "0x1", "0x2", 12)]);

        let engine = IndexingEngine::with_cursor(node, 5);
        let block = engine.get_current_block().await.unwrap();

        assert_eq!(block.number, "0xc");
        // Reading the current block never touches indexing state
        assert_eq!(engine.cursor(), 5);
    }

    #[tokio::test]
    async fn test_get_current_block_propagates_errors() {
        let node = ScriptedNode::with_latest(&[12]);
        let engine = IndexingEngine::with_cursor(node, 5);

        let err = engine.get_current_block().await.unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult { block_number: 12 }));

        let err = engine.get_current_block().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
