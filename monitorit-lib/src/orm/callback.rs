use crate::config::{Component, OptionFn, Options};
use crate::error::Result;
use crate::hook::{
    CallStart, OperationMetrics, OperationObserver, OperationRecord, Outcome, QUERY_DURATION_HELP,
    QUERY_ERRORS_HELP, QUERY_TOTAL_HELP,
};
use crate::registry::CollectorRegistry;
use std::fmt;
use std::sync::Arc;

const QUERY_LABEL_NAMES: [&str; 2] = ["db_name", "command"];
const ERROR_LABEL_NAMES: [&str; 3] = ["db_name", "command", "error"];

/// Statement kinds the ORM runs callback chains for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Query,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Query => "query",
        }
    }

    /// Name of the ORM's own callback that performs the statement
    pub fn builtin_callback(&self) -> String {
        format!("orm:{}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a callback runs relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
}

/// Per-statement state the ORM passes through its callback chain
pub trait Statement {
    /// Start recorded by the before callback, if any
    fn start(&self) -> Option<CallStart>;

    fn set_start(&mut self, start: CallStart);

    /// Outcome of the statement; a "record not found" error must be reported
    /// as `Outcome::NotFound`
    fn outcome(&self) -> Outcome<'_>;
}

/// Callback invoked by the ORM with the statement being processed
pub type StatementCallback<S> = Box<dyn Fn(&mut S) + Send + Sync>;

/// The ORM's callback registration surface
pub trait CallbackProcessor {
    type Statement: Statement + 'static;

    /// Register `callback` under `name`, before or after the `anchor` callback
    /// of `operation`'s chain
    fn register(
        &mut self,
        operation: Operation,
        position: Position,
        anchor: &str,
        name: &str,
        callback: StatementCallback<Self::Statement>,
    ) -> Result<()>;
}

/// ORM callbacks exporting query duration, query count and query errors.
///
/// Exported metrics, labelled `db_name` and `command`:
///
/// - `query_duration_sec`: histogram of statement duration in seconds
/// - `query_total`: number of statements
/// - `query_err_total`: number of failed statements, additionally labelled `error`
#[derive(Clone)]
pub struct QueryCallback {
    db_name: String,
    observer: Arc<dyn OperationObserver>,
}

impl fmt::Debug for QueryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCallback")
            .field("db_name", &self.db_name)
            .finish_non_exhaustive()
    }
}

impl QueryCallback {
    /// Create the callbacks and register their collectors with `registry`
    pub fn new<S, I>(registry: &CollectorRegistry, db_name: S, opts: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::Orm, opts)?;
        let db_name = db_name.into();

        let metrics = OperationMetrics::new(db_name.clone())
            .with_duration(registry.histogram_vec(
                &options,
                "query_duration_sec",
                QUERY_DURATION_HELP,
                &QUERY_LABEL_NAMES,
            )?)
            .with_calls(registry.counter_vec(
                &options,
                "query_total",
                QUERY_TOTAL_HELP,
                &QUERY_LABEL_NAMES,
            )?)
            .with_errors(registry.counter_vec(
                &options,
                "query_err_total",
                QUERY_ERRORS_HELP,
                &ERROR_LABEL_NAMES,
            )?);

        Ok(Self::with_observer(db_name, Arc::new(metrics)))
    }

    /// Create callbacks that report to a custom observer
    pub fn with_observer<S: Into<String>>(db_name: S, observer: Arc<dyn OperationObserver>) -> Self {
        Self {
            db_name: db_name.into(),
            observer,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Register `monitor:before_<op>` and `monitor:after_<op>` around the
    /// ORM's own callback for every [`Operation`].
    ///
    /// Stops at the first registration the ORM rejects.
    pub fn register<P: CallbackProcessor>(&self, processor: &mut P) -> Result<()> {
        for operation in Operation::ALL {
            let anchor = operation.builtin_callback();

            processor.register(
                operation,
                Position::Before,
                &anchor,
                &format!("monitor:before_{}", operation),
                before_callback(),
            )?;

            processor.register(
                operation,
                Position::After,
                &anchor,
                &format!("monitor:after_{}", operation),
                self.after_callback(operation),
            )?;
        }
        Ok(())
    }

    fn after_callback<S: Statement + 'static>(&self, operation: Operation) -> StatementCallback<S> {
        let callback = self.clone();
        Box::new(move |statement: &mut S| callback.record_completion(operation, statement))
    }

    /// Record duration, count and error of a finished statement.
    ///
    /// Duration is skipped when the statement carries no start.
    pub fn record_completion<S: Statement + ?Sized>(&self, operation: Operation, statement: &S) {
        self.observer.observe(&OperationRecord::timed(
            operation.as_str(),
            statement.start(),
            statement.outcome(),
        ));
    }
}

fn before_callback<S: Statement + 'static>() -> StatementCallback<S> {
    Box::new(|statement: &mut S| record_start(statement))
}

/// Before callback: stamp the statement with the current instant
pub fn record_start<S: Statement + ?Sized>(statement: &mut S) {
    statement.set_start(CallStart::now());
}
