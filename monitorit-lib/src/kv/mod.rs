//! Key-value store client instrumentation
//!
//! [`CommandHook`] plugs into the client's command hook and records latency
//! and errors for single commands and pipelines. [`PoolStats`] republishes
//! the client's connection pool counters as gauges.
//!
//! A "nil" reply (cache miss) is reported by the client as
//! [`Outcome::NotFound`](crate::hook::Outcome::NotFound) and never counted as
//! an error.

pub mod hook;
pub mod stats;

pub use hook::{Command, CommandHook, CommandResult, CommandStatus, ProcessHook, PIPELINE_OPERATION};
pub use stats::{PoolSnapshot, PoolStats};
