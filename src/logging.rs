use log::{debug, error, info, trace, warn, LevelFilter};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;

use crate::config::LoggingConfig;

/// Structured logging context for the watcher
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let mut log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times an operation and logs how it ended
pub struct PerformanceMonitor {
    start: Instant,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.start.elapsed().as_millis() as u64;

        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => context.trace(&format!("Operation completed in {}ms", duration)),
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Watcher metrics emitted as structured log lines
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_block_indexed(
        block_number: u64,
        block_hash: Option<&str>,
        transaction_count: usize,
        matched: usize,
        indexed_entries: usize,
    ) {
        let context = LogContext::new("metrics", "block_indexed")
            .with_block_number(block_number)
            .with_metadata("block_hash", json!(block_hash))
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("matched", json!(matched))
            .with_metadata("indexed_entries", json!(indexed_entries));

        context.info(&format!(
            "Block {} indexed: {} transactions, {} matched",
            block_number, transaction_count, matched
        ));
    }

    pub fn log_blocks_skipped(from: u64, to: u64) {
        let context = LogContext::new("metrics", "blocks_skipped")
            .with_metadata("first_skipped", json!(from))
            .with_metadata("last_skipped", json!(to));

        context.debug(&format!("Blocks {}..={} were not individually indexed", from, to));
    }

    pub fn log_subscription(address: &str, newly_added: bool, total: usize) {
        let context = LogContext::new("metrics", "subscription")
            .with_address(address)
            .with_metadata("newly_added", json!(newly_added))
            .with_metadata("total_subscriptions", json!(total));

        if newly_added {
            context.info(&format!("Subscribed {}", address));
        } else {
            context.debug(&format!("{} already subscribed", address));
        }
    }

    pub fn log_tick_failure(cursor: u64, error: &crate::error::WatcherError) {
        let context = LogContext::new("metrics", "tick_failure")
            .with_block_number(cursor)
            .with_metadata("severity", json!(format!("{:?}", error.severity())))
            .with_metadata("transient", json!(error.is_transient()));

        if error.is_transient() {
            context.warn(&format!("Poll failed, retrying on next tick: {}", error));
        } else {
            context.error(&format!("Poll failed: {}", error));
        }
    }
}

/// Initialize logging from configuration. `RUST_LOG` still wins when set.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let json_format = config.format == "json";

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    builder.format(move |buf, record| {
        use std::io::Write;

        let line = record.args().to_string();
        match serde_json::from_str::<Value>(&line) {
            Ok(json_value) if json_format => writeln!(buf, "{}", json_value),
            Ok(json_value) => writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?),
            Err(_) => writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                line
            ),
        }
    });

    // A second init (tests, embedding) keeps the first logger
    if builder.try_init().is_ok() {
        info!("Logging initialized at level {}", level);
    }
}
