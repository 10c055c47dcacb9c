pub mod block_monitor;
pub mod engine;
pub mod registry;
pub mod rpc_client;
pub mod tx_index;

pub use block_monitor::{BlockMonitor, BlockMonitorConfig};
pub use engine::{IndexingEngine, TickOutcome};
pub use registry::SubscriptionRegistry;
pub use rpc_client::{decode_block_number, encode_block_number, NodeClient, RpcClient};
pub use tx_index::TransactionIndex;
