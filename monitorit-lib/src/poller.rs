//! Periodic connection pool statistics polling
//!
//! A poller owns one tokio task that reads a pool snapshot once per interval
//! and republishes it as gauges. A failed read only skips that tick. The task
//! stops when its cancellation token is cancelled.

use crate::error::{MonitorError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A connection pool that can report its current statistics
pub trait PoolStatsSource: Send + Sync + 'static {
    type Snapshot: Send + 'static;

    /// Read the pool's counters at this instant.
    ///
    /// Called from the poller task, so it must not perform network I/O.
    fn pool_stats(&self) -> Result<Self::Snapshot>;
}

impl<T: PoolStatsSource> PoolStatsSource for Arc<T> {
    type Snapshot = T::Snapshot;

    fn pool_stats(&self) -> Result<Self::Snapshot> {
        (**self).pool_stats()
    }
}

/// A fixed set of gauges that mirrors one snapshot type
pub trait PoolGauges: Send + Sync + 'static {
    type Snapshot;

    /// Overwrite every gauge with the snapshot's value
    fn publish(&self, snapshot: &Self::Snapshot);
}

/// Handle to a running poller task
#[derive(Debug)]
pub struct PollerHandle {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Token that stops the poller when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Signal the poller to stop without waiting for it
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Whether the poller task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the poller and wait for its task to exit
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        if let Err(e) = self.task.await {
            warn!("Pool stats poller task failed: {}", e);
        }
    }
}

/// Read one snapshot and publish it. Returns whether the gauges were updated.
pub fn poll_once<S, G>(name: &str, source: &S, gauges: &G) -> bool
where
    S: PoolStatsSource,
    G: PoolGauges<Snapshot = S::Snapshot>,
{
    match source.pool_stats() {
        Ok(snapshot) => {
            gauges.publish(&snapshot);
            true
        }
        Err(e) => {
            warn!("{}: failed to collect pool stats, got error: {}", name, e);
            false
        }
    }
}

/// Spawn a task that publishes `source`'s statistics every `interval`.
///
/// The first snapshot is taken one interval after the call. The task runs
/// until `cancellation_token` is cancelled or the runtime shuts down.
///
/// # Errors
///
/// Returns [`MonitorError::Config`] if `interval` is zero.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_poller<S, G>(
    name: &str,
    source: S,
    gauges: G,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> Result<PollerHandle>
where
    S: PoolStatsSource,
    G: PoolGauges<Snapshot = S::Snapshot>,
{
    if interval.is_zero() {
        return Err(MonitorError::config(format!(
            "{}: stat interval must be greater than 0",
            name
        )));
    }

    let name = name.to_string();
    let token = cancellation_token.clone();
    let task = tokio::spawn(async move {
        run_poll_loop(name, source, gauges, interval, token).await;
    });

    Ok(PollerHandle {
        cancellation_token,
        task,
    })
}

async fn run_poll_loop<S, G>(
    name: String,
    source: S,
    gauges: G,
    interval: Duration,
    cancellation_token: CancellationToken,
) where
    S: PoolStatsSource,
    G: PoolGauges<Snapshot = S::Snapshot>,
{
    info!("{}: pool stats poller started, interval {:?}", name, interval);

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancellation_token.cancelled() => {
                info!("{}: pool stats poller received cancellation signal", name);
                break;
            }
            _ = ticker.tick() => {
                if poll_once(&name, &source, &gauges) {
                    debug!("{}: published pool stats", name);
                }
            }
        }
    }
}
