use crate::config::{Component, OptionFn, Options};
use crate::error::Result;
use crate::poller::{spawn_poller, PollerHandle, PoolGauges, PoolStatsSource};
use crate::registry::CollectorRegistry;
use prometheus::Gauge;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Connection pool counters of a key-value client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Number of total connections in the pool
    pub total_conns: u32,
    /// Number of idle connections in the pool
    pub idle_conns: u32,
    /// Number of stale connections removed from the pool
    pub stale_conns: u32,
}

/// Gauges mirroring a key-value client's connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    options: Options,
    instance_name: String,
    total_conns: Gauge,
    idle_conns: Gauge,
    stale_conns: Gauge,
}

impl PoolStats {
    /// Create the gauges, labelled with `instance_name`, and register them
    pub fn new<S, I>(registry: &CollectorRegistry, instance_name: S, opts: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::KeyValue, opts)?;
        let instance_name = instance_name.into();
        let labels = HashMap::from([("instance_name".to_string(), instance_name.clone())]);

        Ok(Self {
            total_conns: registry.gauge(
                &options,
                "pool_total_conns",
                "Number of total connections in the pool",
                &labels,
            )?,
            idle_conns: registry.gauge(
                &options,
                "pool_idle_conns",
                "Number of idle connections in the pool",
                &labels,
            )?,
            stale_conns: registry.gauge(
                &options,
                "pool_stale_conns",
                "Number of stale connections removed from the pool",
                &labels,
            )?,
            options,
            instance_name,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Poll `source` every configured interval until the returned handle is stopped
    pub fn start<S>(&self, source: S) -> Result<PollerHandle>
    where
        S: PoolStatsSource<Snapshot = PoolSnapshot>,
    {
        self.start_with_token(source, CancellationToken::new())
    }

    /// Poll `source` until `cancellation_token` is cancelled
    pub fn start_with_token<S>(&self, source: S, cancellation_token: CancellationToken) -> Result<PollerHandle>
    where
        S: PoolStatsSource<Snapshot = PoolSnapshot>,
    {
        spawn_poller(
            &format!("kv:{}", self.instance_name),
            source,
            self.clone(),
            self.options.stat_interval(),
            cancellation_token,
        )
    }
}

impl PoolGauges for PoolStats {
    type Snapshot = PoolSnapshot;

    fn publish(&self, snapshot: &PoolSnapshot) {
        self.total_conns.set(f64::from(snapshot.total_conns));
        self.idle_conns.set(f64::from(snapshot.idle_conns));
        self.stale_conns.set(f64::from(snapshot.stale_conns));
    }
}
