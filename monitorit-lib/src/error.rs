use thiserror::Error;

/// Error types for metric registration, configuration and pool polling
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Errors reported by the underlying Prometheus registry
    #[error("Metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    /// A descriptor is already registered but its collector cannot be reused
    #[error("Collector conflict: {0}")]
    CollectorConflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by a client library while registering callbacks
    #[error("Callback registration error: {0}")]
    Callback(String),

    /// Pool statistics could not be read
    #[error("Pool statistics unavailable: {0}")]
    PoolStats(String),

    /// Metrics could not be encoded in the exposition format
    #[error("Metrics encoding error: {0}")]
    Encoding(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Monitor error: {0}")]
    Generic(String),
}

impl MonitorError {
    /// Create a new collector conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        MonitorError::CollectorConflict(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        MonitorError::Config(msg.into())
    }

    /// Create a new callback registration error
    pub fn callback<S: Into<String>>(msg: S) -> Self {
        MonitorError::Callback(msg.into())
    }

    /// Create a new pool statistics error
    pub fn pool_stats<S: Into<String>>(msg: S) -> Self {
        MonitorError::PoolStats(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        MonitorError::Encoding(msg.into())
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        MonitorError::Generic(msg.into())
    }
}

/// Result type for monitoring operations
pub type Result<T> = std::result::Result<T, MonitorError>;
