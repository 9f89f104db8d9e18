//! SQL toolkit instrumentation
//!
//! The toolkit measures statement execution itself, so [`QueryHook`] only
//! labels and records what the toolkit reports after each statement.

pub mod hook;

pub use hook::{operation_name, ExecutedStatement, QueryHook, SqlHook, StatementContext, UNKNOWN_OPERATION};
