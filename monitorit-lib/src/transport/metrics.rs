use crate::config::{with_subsystem, Component, OptionFn, Options};
use crate::error::Result;
use crate::registry::CollectorRegistry;
use futures::FutureExt;
use prometheus::{CounterVec, HistogramVec};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::error;

/// Subsystem of the panic counter
pub const RUNTIME_SUBSYSTEM: &str = "runtime";

/// Code recorded for requests that completed without error
pub const SUCCESS_CODE: i32 = 0;

/// Transport a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    Grpc,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Grpc => "grpc",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the request being served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub kind: TransportKind,
    /// Route or full method name, e.g. `/helloworld.Greeter/SayHello`
    pub operation: String,
}

impl TransportInfo {
    pub fn new<S: Into<String>>(kind: TransportKind, operation: S) -> Self {
        Self {
            kind,
            operation: operation.into(),
        }
    }

    pub fn http<S: Into<String>>(operation: S) -> Self {
        Self::new(TransportKind::Http, operation)
    }

    pub fn grpc<S: Into<String>>(operation: S) -> Self {
        Self::new(TransportKind::Grpc, operation)
    }
}

/// An error a handler can fail with, carrying a numeric code and a reason
pub trait TransportError {
    fn code(&self) -> i32;

    fn reason(&self) -> &str;
}

/// Server-side request metrics.
///
/// - `<ns>_<subsystem>_duration_sec{kind, operation}`: handler duration
/// - `<ns>_<subsystem>_code_total{kind, operation, code, reason}`: requests by result
/// - `<ns>_runtime_panic_total{kind, operation, reason}`: handler panics
#[derive(Debug, Clone)]
pub struct TransportMetrics {
    duration: HistogramVec,
    codes: CounterVec,
    panics: CounterVec,
}

impl TransportMetrics {
    pub fn new<I>(registry: &CollectorRegistry, opts: I) -> Result<Self>
    where
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::Transport, opts)?;
        let runtime = options.clone().merge([with_subsystem(RUNTIME_SUBSYSTEM)]);

        Ok(Self {
            duration: registry.histogram_vec(
                &options,
                "duration_sec",
                "server requests duration(sec).",
                &["kind", "operation"],
            )?,
            codes: registry.counter_vec(
                &options,
                "code_total",
                "The total number of processed requests",
                &["kind", "operation", "code", "reason"],
            )?,
            panics: registry.counter_vec(
                &runtime,
                "panic_total",
                "Total number of panics",
                &["kind", "operation", "reason"],
            )?,
        })
    }

    /// Run `handler`, recording its duration and result code.
    ///
    /// The handler's output is returned unchanged. If the handler panics the
    /// panic is counted and then resumed.
    pub async fn observe<F, T, E>(&self, info: &TransportInfo, handler: F) -> F::Output
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: TransportError,
    {
        self.observe_with(info, handler, |result| match result {
            Ok(_) => (SUCCESS_CODE, String::new()),
            Err(e) => (e.code(), e.reason().to_string()),
        })
        .await
    }

    /// Like [`observe`](Self::observe) with a custom `(code, reason)` classifier
    pub async fn observe_with<F, C>(&self, info: &TransportInfo, handler: F, classify: C) -> F::Output
    where
        F: Future,
        C: FnOnce(&F::Output) -> (i32, String),
    {
        let started = Instant::now();
        match AssertUnwindSafe(handler).catch_unwind().await {
            Ok(output) => {
                let (code, reason) = classify(&output);
                self.record(info, started.elapsed(), code, &reason);
                output
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!("{} {} panicked: {}", info.kind, info.operation, reason);
                self.panic_inc(info, &reason);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Record one finished request
    pub fn record(&self, info: &TransportInfo, elapsed: Duration, code: i32, reason: &str) {
        let kind = info.kind.as_str();
        let operation = info.operation.as_str();
        let code = code.to_string();
        self.duration
            .with_label_values(&[kind, operation])
            .observe(elapsed.as_secs_f64());
        self.codes
            .with_label_values(&[kind, operation, code.as_str(), reason])
            .inc();
    }

    /// Count a panic recovered outside of [`observe`](Self::observe)
    pub fn panic_inc(&self, info: &TransportInfo, reason: &str) {
        self.panics
            .with_label_values(&[info.kind.as_str(), info.operation.as_str(), reason])
            .inc();
    }
}

/// String form of a panic payload
pub fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_info() {
        let info = TransportInfo::grpc("/helloworld.Greeter/SayHello");
        assert_eq!(info.kind.to_string(), "grpc");
        assert_eq!(info.operation, "/helloworld.Greeter/SayHello");
        assert_eq!(TransportInfo::http("/users").kind, TransportKind::Http);
    }

    #[test]
    fn test_panic_reason() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_reason(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(panic_reason(payload.as_ref()), "index out of bounds");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_reason(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_record() {
        let registry = CollectorRegistry::new();
        let metrics = TransportMetrics::new(&registry, Vec::new()).unwrap();
        let info = TransportInfo::http("/orders");

        metrics.record(&info, Duration::from_millis(20), 404, "Not Found");

        let codes = metrics.codes.with_label_values(&["http", "/orders", "404", "Not Found"]);
        assert_eq!(codes.get(), 1.0);
        let duration = metrics.duration.with_label_values(&["http", "/orders"]);
        assert_eq!(duration.get_sample_count(), 1);
    }
}
