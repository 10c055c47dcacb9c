use thiserror::Error;

/// Main error type for the transaction watcher
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Errors surfaced by the remote node client
#[derive(Error, Debug)]
pub enum RpcError {
    /// Any failure sending the request or reading the reply, or a non-2xx status
    #[error("Transport failure: {0}")]
    Transport(String),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Envelope did not have the expected shape
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The node answered with a JSON-RPC `error` member
    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Decode failure: {0}")]
    Decode(String),

    /// The node returned `null` for a block it does not serve yet
    #[error("Empty result for block {block_number}")]
    EmptyResult { block_number: u64 },
}

/// Caller input rejected at the API boundary
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Address must not be empty")]
    EmptyAddress,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// HTTP server errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The process cannot continue
    Critical,
    /// Functionality is affected until the node recovers
    High,
    /// Expected hiccups that resolve on the next poll
    Medium,
    /// Caller mistakes
    Low,
}

impl RpcError {
    /// Whether the next poll is expected to succeed without intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport(_) | RpcError::Http(_) | RpcError::EmptyResult { .. } => true,
            RpcError::Protocol(_) | RpcError::Method { .. } | RpcError::Decode(_) => false,
        }
    }
}

impl WatcherError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WatcherError::Config(_) => ErrorSeverity::Critical,
            WatcherError::Api(_) => ErrorSeverity::Critical,

            WatcherError::Rpc(RpcError::Protocol(_)) => ErrorSeverity::High,
            WatcherError::Rpc(RpcError::Decode(_)) => ErrorSeverity::High,
            WatcherError::Rpc(RpcError::Method { .. }) => ErrorSeverity::High,

            WatcherError::Rpc(RpcError::Transport(_)) => ErrorSeverity::Medium,
            WatcherError::Rpc(RpcError::Http(_)) => ErrorSeverity::Medium,
            WatcherError::Rpc(RpcError::EmptyResult { .. }) => ErrorSeverity::Medium,

            WatcherError::Validation(_) => ErrorSeverity::Low,
        }
    }

    /// Check if the error is expected to clear on its own
    pub fn is_transient(&self) -> bool {
        match self {
            WatcherError::Rpc(e) => e.is_transient(),
            _ => false,
        }
    }
}
