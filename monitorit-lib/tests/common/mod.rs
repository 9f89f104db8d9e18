//! Shared test utilities for monitorit-lib integration tests.
//!
//! Metric lookups go through `CollectorRegistry::gather` so the tests observe
//! exactly what a scrape would see. Lookups return zero when the series does
//! not exist.
#![allow(dead_code)]

use monitorit_lib::CollectorRegistry;
use prometheus::proto::{Metric, MetricFamily};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; later calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("monitorit_lib=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn family<'a>(families: &'a [MetricFamily], name: &str) -> Option<&'a MetricFamily> {
    families.iter().find(|f| f.get_name() == name)
}

fn matches_labels(metric: &Metric, labels: &[(&str, &str)]) -> bool {
    labels.iter().all(|(name, value)| {
        metric
            .get_label()
            .iter()
            .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
    })
}

fn find_metric<F, T>(registry: &CollectorRegistry, name: &str, labels: &[(&str, &str)], read: F) -> Option<T>
where
    F: Fn(&Metric) -> T,
{
    let families = registry.gather();
    family(&families, name)?
        .get_metric()
        .iter()
        .find(|m| matches_labels(m, labels))
        .map(read)
}

/// Whether a metric family with this fully-qualified name has been exported
pub fn has_family(registry: &CollectorRegistry, name: &str) -> bool {
    family(&registry.gather(), name).is_some()
}

/// Counter value of the series matching `labels`
pub fn counter_value(registry: &CollectorRegistry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_metric(registry, name, labels, |m| m.get_counter().get_value()).unwrap_or(0.0)
}

/// Gauge value of the series matching `labels`
pub fn gauge_value(registry: &CollectorRegistry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_metric(registry, name, labels, |m| m.get_gauge().get_value()).unwrap_or(0.0)
}

/// Histogram sample count of the series matching `labels`
pub fn histogram_count(registry: &CollectorRegistry, name: &str, labels: &[(&str, &str)]) -> u64 {
    find_metric(registry, name, labels, |m| m.get_histogram().get_sample_count()).unwrap_or(0)
}

/// Histogram sample sum (seconds) of the series matching `labels`
pub fn histogram_sum(registry: &CollectorRegistry, name: &str, labels: &[(&str, &str)]) -> f64 {
    find_metric(registry, name, labels, |m| m.get_histogram().get_sample_sum()).unwrap_or(0.0)
}
