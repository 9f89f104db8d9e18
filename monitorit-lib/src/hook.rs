//! Shared recording logic behind every client hook adapter
//!
//! Each integration translates its library's callback shape into an
//! [`OperationRecord`] and hands it to an [`OperationObserver`]. The timing
//! state travels in an explicit [`CallStart`] value returned by the "before"
//! step instead of being stashed in ambient context.

use prometheus::{CounterVec, HistogramVec};
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Help strings of the query collectors shared by the ORM and SQL toolkit
/// adapters. Both must register identical descriptors to share a series.
pub(crate) const QUERY_DURATION_HELP: &str = "Histogram of query duration in seconds";
pub(crate) const QUERY_TOTAL_HELP: &str = "Number of queries total";
pub(crate) const QUERY_ERRORS_HELP: &str = "Total number of query errors";

/// Start timestamp of one backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallStart {
    started: Instant,
}

impl CallStart {
    /// Capture the current instant
    pub fn now() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Wall-clock time elapsed since the call started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Terminal outcome of a backend call, as far as metrics are concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<'a> {
    Success,
    /// A "no data" result such as a cache miss. Not a failure.
    NotFound,
    /// A genuine error, carrying its string form
    Failed(Cow<'a, str>),
}

impl<'a> Outcome<'a> {
    /// Outcome for a failed call
    pub fn failed<E: Display + ?Sized>(err: &E) -> Self {
        Outcome::Failed(Cow::Owned(err.to_string()))
    }

    /// Classify a result, treating errors matched by `is_not_found` as the sentinel
    pub fn from_result<T, E, F>(result: &Result<T, E>, is_not_found: F) -> Self
    where
        E: Display,
        F: FnOnce(&E) -> bool,
    {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) if is_not_found(e) => Outcome::NotFound,
            Err(e) => Outcome::failed(e),
        }
    }

    /// Whether this outcome counts as an error
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The error label value, if any
    pub fn error_label(&self) -> Option<&str> {
        match self {
            Outcome::Failed(reason) => Some(reason.as_ref()),
            _ => None,
        }
    }
}

/// One completed operation
#[derive(Debug, Clone)]
pub struct OperationRecord<'a> {
    pub operation: &'a str,
    /// `None` when the start of the call was never captured
    pub elapsed: Option<Duration>,
    pub outcome: Outcome<'a>,
}

impl<'a> OperationRecord<'a> {
    pub fn new(operation: &'a str, elapsed: Option<Duration>, outcome: Outcome<'a>) -> Self {
        Self {
            operation,
            elapsed,
            outcome,
        }
    }

    /// Record for a call timed from `start`
    pub fn timed(operation: &'a str, start: Option<CallStart>, outcome: Outcome<'a>) -> Self {
        Self::new(operation, start.map(|s| s.elapsed()), outcome)
    }
}

/// Capability shared by all hook adapters: record a completed operation.
///
/// Implementations must be cheap and must never block, since they run on the
/// caller's thread around every backend call.
pub trait OperationObserver: Send + Sync {
    fn observe(&self, record: &OperationRecord<'_>);
}

impl<T: OperationObserver + ?Sized> OperationObserver for Arc<T> {
    fn observe(&self, record: &OperationRecord<'_>) {
        (**self).observe(record)
    }
}

/// Prometheus-backed observer for one family of operations.
///
/// Every collector is optional so that an adapter can split single and
/// batched calls across different collector sets.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    instance_name: String,
    duration: Option<HistogramVec>,
    calls: Option<CounterVec>,
    errors: Option<CounterVec>,
}

impl OperationMetrics {
    pub fn new<S: Into<String>>(instance_name: S) -> Self {
        Self {
            instance_name: instance_name.into(),
            duration: None,
            calls: None,
            errors: None,
        }
    }

    /// Histogram labelled `(instance, operation)`
    pub fn with_duration(mut self, histogram: HistogramVec) -> Self {
        self.duration = Some(histogram);
        self
    }

    /// Counter labelled `(instance, operation)`
    pub fn with_calls(mut self, counter: CounterVec) -> Self {
        self.calls = Some(counter);
        self
    }

    /// Counter labelled `(instance, operation, error)`
    pub fn with_errors(mut self, counter: CounterVec) -> Self {
        self.errors = Some(counter);
        self
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl OperationObserver for OperationMetrics {
    fn observe(&self, record: &OperationRecord<'_>) {
        let labels = [self.instance_name.as_str(), record.operation];

        if let (Some(histogram), Some(elapsed)) = (&self.duration, record.elapsed) {
            histogram
                .with_label_values(&labels)
                .observe(elapsed.as_secs_f64());
        }

        if let Some(calls) = &self.calls {
            calls.with_label_values(&labels).inc();
        }

        if let (Some(errors), Some(reason)) = (&self.errors, record.outcome.error_label()) {
            errors
                .with_label_values(&[self.instance_name.as_str(), record.operation, reason])
                .inc();
        }
    }
}
