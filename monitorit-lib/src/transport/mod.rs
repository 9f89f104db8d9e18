//! Server-side request metrics for a microservice transport layer
//!
//! [`TransportMetrics::observe`] wraps a handler future and records its
//! duration, result code and panics. With the `server` feature,
//! [`MetricsService`] does the same for any hyper service.

#[cfg(feature = "server")]
pub mod http;
pub mod metrics;

#[cfg(feature = "server")]
pub use http::MetricsService;
pub use metrics::{
    panic_reason, TransportError, TransportInfo, TransportKind, TransportMetrics, RUNTIME_SUBSYSTEM,
    SUCCESS_CODE,
};
