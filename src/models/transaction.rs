use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blockchain::rpc_client::decode_block_number;
use crate::error::RpcError;
use crate::models::Address;

/// A transaction as returned inside a full `eth_getBlockByNumber` block.
///
/// Only `hash`, `from`, `to` and `blockNumber` are interpreted. Every other
/// field the node sends (value, gas, nonce, v/r/s, access lists, ...) is kept
/// in `extra` and written back unchanged when the record is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation
    #[serde(default)]
    pub to: Option<String>,
    pub block_number: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    pub fn sender(&self) -> Address {
        Address::new(&self.from)
    }

    pub fn receiver(&self) -> Option<Address> {
        self.to.as_deref().map(Address::new)
    }
}

/// A block fetched with full transaction objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// Decoded block height.
    pub fn number_u64(&self) -> Result<u64, RpcError> {
        decode_block_number(&self.number)
    }

    pub fn hash(&self) -> Option<&str> {
        self.extra.get("hash").and_then(Value::as_str)
    }
}
