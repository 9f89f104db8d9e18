//! # Monitorit Library
//!
//! Prometheus instrumentation for database and service clients. Each adapter
//! plugs into its library's hook or callback extension point and exports
//! latency histograms, call counters and error counters. Pool statistics are
//! polled in the background and published as gauges.
//!
//! ## Integrations
//!
//! - [`kv`]: key-value client commands and pipelines, connection pool gauges
//! - [`orm`]: ORM create/update/delete/query callbacks, database pool gauges
//! - [`sqlkit`]: SQL toolkit statement hooks
//! - [`transport`]: server request duration, result codes and panics
//!
//! All adapters register their collectors through a [`CollectorRegistry`]
//! that hands back the existing collector when the same metric is requested
//! twice, so several instances can share one set of series.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use monitorit_lib::kv::{CommandHook, PoolStats};
//! use monitorit_lib::{default_registry, with_namespace, MetricsServerConfig, MetricsServer};
//! use tokio_util::sync::CancellationToken;
//! use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let registry = default_registry();
//!
//!     let hook = CommandHook::new(&registry, "sessions", vec![with_namespace("shop")])?;
//!     let stats = PoolStats::new(&registry, "sessions", vec![with_namespace("shop")])?;
//!     let poller = stats.start(my_pool_handle())?;
//!     // install `hook` on the client ...
//!
//!     let shutdown = CancellationToken::new();
//!     MetricsServer::new(MetricsServerConfig::default(), registry)
//!         .start(shutdown.clone())
//!         .await?;
//!     poller.shutdown().await;
//!     Ok(())
//! }
//!
//! pub fn init_logging() {
//!     let env_filter = EnvFilter::try_from_default_env()
//!         .unwrap_or_else(|_| EnvFilter::new("monitorit_lib=debug"));
//!
//!     let fmt_layer = fmt::layer()
//!         .with_target(true)
//!         .with_thread_ids(true)
//!         .with_level(true)
//!         .compact();
//!
//!     tracing_subscriber::registry()
//!         .with(env_filter)
//!         .with(fmt_layer)
//!         .init();
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod registry;

// Shared hook recording and pool polling
pub mod hook;
pub mod poller;

// Client integrations
pub mod kv;
pub mod orm;
pub mod sqlkit;
pub mod transport;

// Metrics exposition
#[cfg(feature = "server")]
pub mod server;

// Public API exports
pub use config::{
    with_duration_buckets, with_namespace, with_stat_interval, with_subsystem, Component, OptionFn, Options,
};
pub use error::MonitorError;
pub use hook::{CallStart, OperationMetrics, OperationObserver, OperationRecord, Outcome};
pub use poller::{poll_once, spawn_poller, PollerHandle, PoolGauges, PoolStatsSource};
pub use registry::{default_registry, CollectorRegistry};
pub type MonitorResult<T> = Result<T, MonitorError>;

#[cfg(feature = "server")]
pub use server::{create_metrics_server, MetricsServer, MetricsServerConfig};

pub use tokio_util::sync::CancellationToken;
