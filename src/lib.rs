pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

pub use blockchain::{BlockMonitor, IndexingEngine, NodeClient, RpcClient, TickOutcome};
pub use config::{ApiConfig, AppConfig, LoggingConfig, RpcConfig, WatcherConfig};
pub use error::{ApiError, ConfigError, Result, RpcError, ValidationError, WatcherError};
pub use logging::{LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{Address, Block, Transaction};
