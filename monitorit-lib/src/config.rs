use crate::error::{MonitorError, Result};
use prometheus::{HistogramOpts, Opts};
use std::fmt;
use std::time::Duration;

/// Namespace shared by the client integrations unless overridden
pub const DEFAULT_NAMESPACE: &str = "service_component";

/// Namespace used by transport request metrics
pub const TRANSPORT_NAMESPACE: &str = "service";

/// Default duration buckets (seconds) for client operation histograms
pub const DEFAULT_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Default duration buckets (seconds) for transport request histograms
pub const TRANSPORT_DURATION_BUCKETS: [f64; 8] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Default pool statistics polling interval
pub const DEFAULT_STAT_INTERVAL: Duration = Duration::from_secs(10);

/// The client integration an [`Options`] value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Key-value store client commands and pipelines
    KeyValue,
    /// ORM create/update/delete/query callbacks
    Orm,
    /// Lightweight SQL toolkit statement hooks
    SqlToolkit,
    /// Server-side transport request metrics
    Transport,
}

impl Component {
    /// Default metric subsystem for this component
    pub fn default_subsystem(&self) -> &'static str {
        match self {
            Component::KeyValue => "kv",
            Component::Orm => "orm",
            Component::SqlToolkit => "sql",
            Component::Transport => "requests",
        }
    }

    fn default_namespace(&self) -> &'static str {
        match self {
            Component::Transport => TRANSPORT_NAMESPACE,
            _ => DEFAULT_NAMESPACE,
        }
    }

    fn default_buckets(&self) -> Vec<f64> {
        match self {
            Component::Transport => TRANSPORT_DURATION_BUCKETS.to_vec(),
            _ => DEFAULT_DURATION_BUCKETS.to_vec(),
        }
    }
}

/// Options used to customize the exported metrics of one adapter.
///
/// Values are fixed once the adapter is constructed; the only way to change
/// the defaults is the list of [`OptionFn`]s given to [`Options::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    namespace: String,
    subsystem: String,
    duration_buckets: Vec<f64>,
    stat_interval: Duration,
}

/// A named option-applying function, see [`with_namespace`] and friends
pub struct OptionFn(Box<dyn FnOnce(&mut Options) + Send>);

impl OptionFn {
    fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Options) + Send + 'static,
    {
        Self(Box::new(apply))
    }
}

impl fmt::Debug for OptionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OptionFn")
    }
}

impl Options {
    /// Default options for the given component
    pub fn defaults(component: Component) -> Self {
        Self {
            namespace: component.default_namespace().to_string(),
            subsystem: component.default_subsystem().to_string(),
            duration_buckets: component.default_buckets(),
            stat_interval: DEFAULT_STAT_INTERVAL,
        }
    }

    /// Apply option functions in order, later options win
    pub fn merge<I>(mut self, opts: I) -> Self
    where
        I: IntoIterator<Item = OptionFn>,
    {
        for opt in opts {
            (opt.0)(&mut self);
        }
        self
    }

    /// Build validated options from the component defaults and `opts`
    pub fn build<I>(component: Component, opts: I) -> Result<Self>
    where
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Self::defaults(component).merge(opts);
        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.duration_buckets.is_empty() {
            return Err(MonitorError::config("Duration buckets must not be empty"));
        }

        if self.duration_buckets.iter().any(|b| !b.is_finite()) {
            return Err(MonitorError::config("Duration buckets must be finite"));
        }

        if self.duration_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MonitorError::config(format!(
                "Duration buckets must be strictly ascending, got {:?}",
                self.duration_buckets
            )));
        }

        if self.stat_interval.is_zero() {
            return Err(MonitorError::config("Stat interval must be greater than 0"));
        }

        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    pub fn duration_buckets(&self) -> &[f64] {
        &self.duration_buckets
    }

    pub fn stat_interval(&self) -> Duration {
        self.stat_interval
    }

    /// Counter/gauge options under this namespace and subsystem
    pub(crate) fn opts(&self, name: &str, help: &str) -> Opts {
        Opts::new(name, help)
            .namespace(self.namespace.clone())
            .subsystem(self.subsystem.clone())
    }

    /// Histogram options under this namespace and subsystem with the configured buckets
    pub(crate) fn histogram_opts(&self, name: &str, help: &str) -> HistogramOpts {
        HistogramOpts::new(name, help)
            .namespace(self.namespace.clone())
            .subsystem(self.subsystem.clone())
            .buckets(self.duration_buckets.clone())
    }
}

/// Set the namespace of all metrics
pub fn with_namespace<S: Into<String>>(namespace: S) -> OptionFn {
    let namespace = namespace.into();
    OptionFn::new(move |options| options.namespace = namespace)
}

/// Set the subsystem of all metrics
pub fn with_subsystem<S: Into<String>>(subsystem: S) -> OptionFn {
    let subsystem = subsystem.into();
    OptionFn::new(move |options| options.subsystem = subsystem)
}

/// Set the buckets of the duration histograms
pub fn with_duration_buckets<B: Into<Vec<f64>>>(buckets: B) -> OptionFn {
    let buckets = buckets.into();
    OptionFn::new(move |options| options.duration_buckets = buckets)
}

/// Set the pool statistics polling interval
pub fn with_stat_interval(interval: Duration) -> OptionFn {
    OptionFn::new(move |options| options.stat_interval = interval)
}
