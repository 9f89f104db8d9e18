use crate::config::{Component, OptionFn, Options};
use crate::error::Result;
use crate::hook::{
    OperationMetrics, OperationObserver, OperationRecord, Outcome, QUERY_DURATION_HELP, QUERY_ERRORS_HELP,
    QUERY_TOTAL_HELP,
};
use crate::registry::CollectorRegistry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Label used when a statement has no leading keyword
pub const UNKNOWN_OPERATION: &str = "unknown";

const QUERY_LABEL_NAMES: [&str; 2] = ["db_name", "command"];
const ERROR_LABEL_NAMES: [&str; 3] = ["db_name", "command", "error"];

/// Derive the operation label from raw statement text: the first
/// whitespace-delimited token, lower-cased.
///
/// ```
/// use monitorit_lib::sqlkit::operation_name;
///
/// assert_eq!(operation_name("SELECT * FROM t"), "select");
/// assert_eq!(operation_name("update"), "update");
/// assert_eq!(operation_name(""), "unknown");
/// ```
pub fn operation_name(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_else(|| UNKNOWN_OPERATION.to_string())
}

/// A statement the toolkit has finished executing
pub trait ExecutedStatement {
    fn sql(&self) -> &str;

    /// Execution time measured by the toolkit
    fn execute_time(&self) -> Duration;

    fn outcome(&self) -> Outcome<'_>;
}

/// Plain [`ExecutedStatement`] carrying what the toolkit reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementContext {
    pub sql: String,
    pub args: Vec<String>,
    pub execute_time: Duration,
    pub error: Option<String>,
}

impl StatementContext {
    pub fn new<S: Into<String>>(sql: S, execute_time: Duration) -> Self {
        Self {
            sql: sql.into(),
            execute_time,
            ..Self::default()
        }
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_error<E: fmt::Display>(mut self, err: E) -> Self {
        self.error = Some(err.to_string());
        self
    }
}

impl ExecutedStatement for StatementContext {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute_time(&self) -> Duration {
        self.execute_time
    }

    fn outcome(&self) -> Outcome<'_> {
        match &self.error {
            Some(e) => Outcome::Failed(e.as_str().into()),
            None => Outcome::Success,
        }
    }
}

/// The toolkit's statement hook extension point
pub trait SqlHook: Send + Sync {
    fn before_process(&self, statement: &dyn ExecutedStatement);

    fn after_process(&self, statement: &dyn ExecutedStatement);
}

/// Statement hook exporting query duration, query count and query errors.
///
/// Registers the same descriptors as the ORM callbacks (`query_duration_sec`,
/// `query_total`, `query_err_total`), so both adapters share one series when
/// configured with the same namespace and subsystem.
#[derive(Clone)]
pub struct QueryHook {
    db_name: String,
    observer: Arc<dyn OperationObserver>,
}

impl fmt::Debug for QueryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHook")
            .field("db_name", &self.db_name)
            .finish_non_exhaustive()
    }
}

impl QueryHook {
    /// Create a hook and register its collectors with `registry`
    pub fn new<S, I>(registry: &CollectorRegistry, db_name: S, opts: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::SqlToolkit, opts)?;
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

    /// Create a hook that reports to a custom observer
    pub fn with_observer<S: Into<String>>(db_name: S, observer: Arc<dyn OperationObserver>) -> Self {
        Self {
            db_name: db_name.into(),
            observer,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

impl SqlHook for QueryHook {
    fn before_process(&self, _statement: &dyn ExecutedStatement) {}

    fn after_process(&self, statement: &dyn ExecutedStatement) {
        let operation = operation_name(statement.sql());
        self.observer.observe(&OperationRecord::new(
            &operation,
            Some(statement.execute_time()),
            statement.outcome(),
        ));
    }
}
