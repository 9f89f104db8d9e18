use crate::config::{Component, OptionFn, Options};
use crate::error::Result;
use crate::poller::{spawn_poller, PollerHandle, PoolGauges, PoolStatsSource};
use crate::registry::CollectorRegistry;
use prometheus::Gauge;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Connection pool statistics of a database handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbStats {
    /// Maximum number of open connections to the database
    pub max_open_connections: u32,

    /// The number of established connections both in use and idle
    pub open_connections: u32,
    /// The number of connections currently in use
    pub in_use: u32,
    /// The number of idle connections
    pub idle: u32,

    /// The total number of connections waited for
    pub wait_count: u64,
    /// The total time blocked waiting for a new connection
    pub wait_duration: Duration,
    /// The total number of connections closed due to the max idle limit
    pub max_idle_closed: u64,
    /// The total number of connections closed due to the max lifetime limit
    pub max_lifetime_closed: u64,
    /// The total number of connections closed due to the max idle time limit
    pub max_idle_time_closed: u64,
}

/// Gauges mirroring a database handle's [`DbStats`]
#[derive(Debug, Clone)]
pub struct DbStatsCollector {
    options: Options,
    db_name: String,
    max_open_connections: Gauge,
    open_connections: Gauge,
    in_use: Gauge,
    idle: Gauge,
    wait_count: Gauge,
    wait_duration: Gauge,
    max_idle_closed: Gauge,
    max_lifetime_closed: Gauge,
    max_idle_time_closed: Gauge,
}

impl DbStatsCollector {
    /// Create the `dbstats_*` gauges, labelled with `db_name`, and register them
    pub fn new<S, I>(registry: &CollectorRegistry, db_name: S, opts: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::Orm, opts)?;
        let db_name = db_name.into();
        let labels = HashMap::from([("db_name".to_string(), db_name.clone())]);
        let gauge = |name: &str, help: &str| registry.gauge(&options, name, help, &labels);

        Ok(Self {
            max_open_connections: gauge(
                "dbstats_max_open_connections",
                "Maximum number of open connections to the database.",
            )?,
            open_connections: gauge(
                "dbstats_open_connections",
                "The number of established connections both in use and idle.",
            )?,
            in_use: gauge("dbstats_in_use", "The number of connections currently in use.")?,
            idle: gauge("dbstats_idle", "The number of idle connections.")?,
            wait_count: gauge("dbstats_wait_count", "The total number of connections waited for.")?,
            wait_duration: gauge(
                "dbstats_wait_duration",
                "The total time in seconds blocked waiting for a new connection.",
            )?,
            max_idle_closed: gauge(
                "dbstats_max_idle_closed",
                "The total number of connections closed due to the max idle limit.",
            )?,
            max_lifetime_closed: gauge(
                "dbstats_max_lifetime_closed",
                "The total number of connections closed due to the max lifetime limit.",
            )?,
            max_idle_time_closed: gauge(
                "dbstats_max_idletime_closed",
                "The total number of connections closed due to the max idle time limit.",
            )?,
            options,
            db_name,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Poll `source` every configured interval until the returned handle is stopped
    pub fn start<S>(&self, source: S) -> Result<PollerHandle>
    where
        S: PoolStatsSource<Snapshot = DbStats>,
    {
        self.start_with_token(source, CancellationToken::new())
    }

    /// Poll `source` until `cancellation_token` is cancelled
    pub fn start_with_token<S>(&self, source: S, cancellation_token: CancellationToken) -> Result<PollerHandle>
    where
        S: PoolStatsSource<Snapshot = DbStats>,
    {
        spawn_poller(
            &format!("orm:{}", self.db_name),
            source,
            self.clone(),
            self.options.stat_interval(),
            cancellation_token,
        )
    }
}

impl PoolGauges for DbStatsCollector {
    type Snapshot = DbStats;

    fn publish(&self, stats: &DbStats) {
        self.max_open_connections.set(f64::from(stats.max_open_connections));
        self.open_connections.set(f64::from(stats.open_connections));
        self.in_use.set(f64::from(stats.in_use));
        self.idle.set(f64::from(stats.idle));
        self.wait_count.set(stats.wait_count as f64);
        self.wait_duration.set(stats.wait_duration.as_secs_f64());
        self.max_idle_closed.set(stats.max_idle_closed as f64);
        self.max_lifetime_closed.set(stats.max_lifetime_closed as f64);
        self.max_idle_time_closed.set(stats.max_idle_time_closed as f64);
    }
}

/// sqlx pools expose their size and idle count; wait and close counters are
/// not tracked by sqlx and stay at zero.
#[cfg(feature = "sqlx")]
impl<DB: sqlx::Database> PoolStatsSource for sqlx::Pool<DB> {
    type Snapshot = DbStats;

    fn pool_stats(&self) -> Result<DbStats> {
        if self.is_closed() {
            return Err(crate::error::MonitorError::pool_stats("pool is closed"));
        }

        let open_connections = self.size();
        let idle = u32::try_from(self.num_idle()).unwrap_or(u32::MAX);
        Ok(DbStats {
            max_open_connections: self.options().get_max_connections(),
            open_connections,
            in_use: open_connections.saturating_sub(idle),
            idle,
            ..DbStats::default()
        })
    }
}
