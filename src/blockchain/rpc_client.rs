use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::Block;

const BLOCK_NUMBER_METHOD: &str = "eth_blockNumber";
const GET_BLOCK_METHOD: &str = "eth_getBlockByNumber";

// Fixed per-method ids; they only tag a single request/response pair.
const BLOCK_NUMBER_REQUEST_ID: u64 = 83;
const GET_BLOCK_REQUEST_ID: u64 = 84;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// The two node queries the watcher depends on.
///
/// Implementations perform a fresh round trip per call: no retries, no caching.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Height of the node's latest block.
    async fn get_latest_block_number(&self) -> Result<u64, RpcError>;

    /// Block at `number` with full transaction objects.
    async fn get_block_by_number(&self, number: u64) -> Result<Block, RpcError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for an Ethereum-compatible node over HTTP
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
}

impl RpcClient {
    pub fn new(endpoint: String) -> Result<Self, RpcError> {
        Self::new_with_timeout(endpoint, DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn new_with_timeout(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and return its `result` member, `None` when the node
    /// sent `null` or nothing.
    async fn make_request(&self, method: &str, params: Vec<Value>, id: u64) -> Result<Option<Value>, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        LogContext::new("rpc_client", "make_request")
            .with_metadata("method", json!(method))
            .with_metadata("id", json!(id))
            .trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Transport(format!("timed out after {}s", self.timeout_seconds))
                } else if e.is_connect() {
                    RpcError::Transport(format!("connection failed: {}", e))
                } else {
                    RpcError::Transport(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(format!("failed to read response body: {}", e)))?;

        let rpc_response: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|e| RpcError::Protocol(format!("malformed response envelope: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result.filter(|value| !value.is_null()))
    }

    async fn fetch_latest_block_number(&self) -> Result<u64, RpcError> {
        let value = self
            .make_request(BLOCK_NUMBER_METHOD, vec![], BLOCK_NUMBER_REQUEST_ID)
            .await?
            .ok_or_else(|| RpcError::Protocol("no result in eth_blockNumber response".to_string()))?;

        let hex = value
            .as_str()
            .ok_or_else(|| RpcError::Protocol(format!("block number is not a string: {}", value)))?;

        decode_block_number(hex)
    }

    async fn fetch_block(&self, number: u64) -> Result<Block, RpcError> {
        // Full transaction objects are always requested
        let params = vec![Value::String(encode_block_number(number)), Value::Bool(true)];

        let value = self
            .make_request(GET_BLOCK_METHOD, params, GET_BLOCK_REQUEST_ID)
            .await?
            .ok_or(RpcError::EmptyResult { block_number: number })?;

        let block: Block = serde_json::from_value(value)
            .map_err(|e| RpcError::Decode(format!("failed to decode block {}: {}", number, e)))?;

        LogContext::new("rpc_client", "get_block_by_number")
            .with_block_number(number)
            .with_metadata("transaction_count", json!(block.transactions.len()))
            .debug(&format!("Retrieved block {} with {} transactions", number, block.transactions.len()));

        Ok(block)
    }
}

#[async_trait]
impl NodeClient for RpcClient {
    async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
        let monitor = PerformanceMonitor::new("rpc_get_latest_block_number");

        let result = self.fetch_latest_block_number().await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(BLOCK_NUMBER_METHOD, duration, result.is_ok());
        result
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        let monitor = PerformanceMonitor::new("rpc_get_block_by_number")
            .with_metadata("block_number", json!(number));

        let result = self.fetch_block(number).await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(GET_BLOCK_METHOD, duration, result.is_ok());
        result
    }
}

/// Encode a block height the way the endpoint expects it (`0x`-prefixed, lower-case hex).
pub fn encode_block_number(number: u64) -> String {
    format!("0x{:x}", number)
}

/// Decode a `0x`-prefixed hex quantity.
///
/// A missing prefix or empty string is a protocol violation; bad hex digits or
/// overflow are decode failures.
pub fn decode_block_number(raw: &str) -> Result<u64, RpcError> {
    if raw.is_empty() {
        return Err(RpcError::Protocol("empty block number".to_string()));
    }

    let payload = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Protocol(format!("block number {:?} is not 0x-prefixed", raw)))?;

    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RpcError::Decode(format!("invalid hex quantity {:?}", raw)));
    }

    u64::from_str_radix(payload, 16)
        .map_err(|e| RpcError::Decode(format!("failed to parse block number {:?}: {}", raw, e)))
}
