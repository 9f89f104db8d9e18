//! Collector registration with register-or-reuse semantics
//!
//! Several adapter instances may ask for the same metric (same namespace,
//! subsystem, name and const labels). The first registration wins and every
//! later request receives a clone of the collector that is already
//! registered, so all observations land in one place.

use crate::config::Options;
use crate::error::{MonitorError, Result};
use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, Encoder, Gauge, HistogramVec, Registry, TextEncoder};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tracing::debug;

lazy_static! {
    /// Process-wide registry shared by adapters built without an explicit one
    static ref DEFAULT_REGISTRY: Arc<CollectorRegistry> = Arc::new(CollectorRegistry::new());
}

/// Shared default registry
pub fn default_registry() -> Arc<CollectorRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// A Prometheus registry that hands back the existing collector when a
/// descriptor is registered twice
pub struct CollectorRegistry {
    inner: Registry,
    collectors: Mutex<HashMap<u64, RegisteredCollector>>,
}

struct RegisteredCollector {
    dim_hash: u64,
    collector: Box<dyn Any + Send + Sync>,
}

/// Descriptor identity of a collector
struct DescriptorKey {
    /// Covers the fully-qualified name and const label values
    id: u64,
    /// Covers the help string and label names
    dim_hash: u64,
    name: String,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry").finish_non_exhaustive()
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorRegistry {
    /// Create a registry backed by a fresh `prometheus::Registry`
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Wrap an existing `prometheus::Registry`.
    ///
    /// Collectors registered on `inner` directly are unknown to this wrapper;
    /// registering the same descriptor again through it is reported as a
    /// [`MonitorError::CollectorConflict`].
    pub fn with_registry(inner: Registry) -> Self {
        Self {
            inner,
            collectors: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.inner
    }

    /// Register `collector`, or return the collector already registered under
    /// the same descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Registry`] for malformed or inconsistent
    /// descriptors and [`MonitorError::CollectorConflict`] when the existing
    /// collector has a different type, help string or label names.
    pub fn register<C>(&self, collector: C) -> Result<C>
    where
        C: Collector + Clone + 'static,
    {
        let key = descriptor_key(&collector)?;
        let name = &key.name;
        let mut collectors = self
            .collectors
            .lock()
            .map_err(|_| MonitorError::generic("collector map lock poisoned"))?;

        match self.inner.register(Box::new(collector.clone())) {
            Ok(()) => {
                debug!("Registered collector {}", name);
                collectors.insert(
                    key.id,
                    RegisteredCollector {
                        dim_hash: key.dim_hash,
                        collector: Box::new(collector.clone()),
                    },
                );
                Ok(collector)
            }
            Err(prometheus::Error::AlreadyReg) => {
                let existing = collectors.get(&key.id).ok_or_else(|| {
                    MonitorError::conflict(format!(
                        "{} is registered but was not registered through this registry",
                        name
                    ))
                })?;
                if existing.dim_hash != key.dim_hash {
                    return Err(MonitorError::conflict(format!(
                        "{} is already registered with different label names or help string",
                        name
                    )));
                }
                let existing = existing.collector.downcast_ref::<C>().ok_or_else(|| {
                    MonitorError::conflict(format!(
                        "{} is already registered as a different collector type",
                        name
                    ))
                })?;
                debug!("Reusing already registered collector {}", name);
                Ok(existing.clone())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`register`](Self::register) but aborts on failure.
    ///
    /// Registration failures other than a reusable duplicate indicate a
    /// programming error, so this is meant for startup code only.
    pub fn must_register<C>(&self, collector: C) -> C
    where
        C: Collector + Clone + 'static,
    {
        match self.register(collector) {
            Ok(collector) => collector,
            Err(e) => panic!("failed to register collector: {}", e),
        }
    }

    /// Build and register a histogram vector from `options`
    pub fn histogram_vec(
        &self,
        options: &Options,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<HistogramVec> {
        let histogram = HistogramVec::new(options.histogram_opts(name, help), label_names)?;
        self.register(histogram)
    }

    /// Build and register a counter vector from `options`
    pub fn counter_vec(
        &self,
        options: &Options,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<CounterVec> {
        let counter = CounterVec::new(options.opts(name, help), label_names)?;
        self.register(counter)
    }

    /// Build and register a gauge carrying `const_labels`
    pub fn gauge(
        &self,
        options: &Options,
        name: &str,
        help: &str,
        const_labels: &HashMap<String, String>,
    ) -> Result<Gauge> {
        let gauge = Gauge::with_opts(options.opts(name, help).const_labels(const_labels.clone()))?;
        self.register(gauge)
    }

    /// Gather all metric families
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.inner.gather()
    }

    /// Gather all metrics and encode them in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MonitorError::encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MonitorError::encoding(e.to_string()))
    }
}

fn descriptor_key<C: Collector>(collector: &C) -> Result<DescriptorKey> {
    let descs = collector.desc();
    let first = descs
        .first()
        .ok_or_else(|| MonitorError::generic("collector has no descriptors"))?;

    if descs.len() == 1 {
        return Ok(DescriptorKey {
            id: first.id,
            dim_hash: first.dim_hash,
            name: first.fq_name.clone(),
        });
    }

    let mut ids = DefaultHasher::new();
    let mut dims = DefaultHasher::new();
    for desc in &descs {
        desc.id.hash(&mut ids);
        desc.dim_hash.hash(&mut dims);
    }
    Ok(DescriptorKey {
        id: ids.finish(),
        dim_hash: dims.finish(),
        name: first.fq_name.clone(),
    })
}
