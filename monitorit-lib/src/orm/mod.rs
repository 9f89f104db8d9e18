//! ORM instrumentation
//!
//! [`QueryCallback`] registers before/after callbacks around the ORM's
//! create, update, delete and query chains. [`DbStatsCollector`] republishes
//! the database handle's pool statistics as gauges.

pub mod callback;
pub mod stats;

pub use callback::{
    record_start, CallbackProcessor, Operation, Position, QueryCallback, Statement,
    StatementCallback,
};
pub use stats::{DbStats, DbStatsCollector};
