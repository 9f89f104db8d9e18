//! Tests for the pool statistics poller
//!
//! Time is paused so that ticks are driven deterministically by the tokio
//! test clock.

mod common;

use common::gauge_value;
use monitorit_lib::error::Result;
use monitorit_lib::kv::{PoolSnapshot, PoolStats};
use monitorit_lib::orm::{DbStats, DbStatsCollector};
use monitorit_lib::{
    poll_once, spawn_poller, with_stat_interval, CancellationToken, CollectorRegistry, MonitorError,
    PoolStatsSource,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOTAL_CONNS: &str = "service_component_kv_pool_total_conns";
const IDLE_CONNS: &str = "service_component_kv_pool_idle_conns";
const STALE_CONNS: &str = "service_component_kv_pool_stale_conns";
const INTERVAL: Duration = Duration::from_secs(10);

/// Pool source replaying a fixed script of snapshots and failures
struct ScriptedSource<T> {
    script: Mutex<VecDeque<Result<T>>>,
    calls: AtomicUsize,
}

impl<T> ScriptedSource<T> {
    fn new(script: Vec<Result<T>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Send + 'static> PoolStatsSource for ScriptedSource<T> {
    type Snapshot = T;

    fn pool_stats(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::pool_stats("script exhausted")))
    }
}

fn snapshot(total: u32, idle: u32, stale: u32) -> PoolSnapshot {
    PoolSnapshot {
        total_conns: total,
        idle_conns: idle,
        stale_conns: stale,
    }
}

fn pool_stats(registry: &CollectorRegistry) -> PoolStats {
    common::init_test_logging();
    PoolStats::new(registry, "cache", vec![with_stat_interval(INTERVAL)]).unwrap()
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_after_one_interval() {
    let registry = CollectorRegistry::new();
    let source = ScriptedSource::new(vec![Ok(snapshot(5, 2, 0))]);
    let handle = pool_stats(&registry).start(Arc::clone(&source)).unwrap();

    advance(INTERVAL / 2).await;
    assert_eq!(source.calls(), 0);
    assert_eq!(gauge_value(&registry, TOTAL_CONNS, &[("instance_name", "cache")]), 0.0);

    advance(INTERVAL / 2 + Duration::from_millis(1)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(gauge_value(&registry, TOTAL_CONNS, &[("instance_name", "cache")]), 5.0);
    assert_eq!(gauge_value(&registry, IDLE_CONNS, &[("instance_name", "cache")]), 2.0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_last_successful_snapshot_wins() {
    let registry = CollectorRegistry::new();
    let source = ScriptedSource::new(vec![
        Ok(snapshot(10, 4, 1)),
        Err(MonitorError::pool_stats("pool busy")),
        Ok(snapshot(12, 3, 2)),
        Err(MonitorError::pool_stats("pool busy")),
    ]);
    let handle = pool_stats(&registry).start(Arc::clone(&source)).unwrap();

    advance(INTERVAL * 4 + Duration::from_millis(1)).await;
    assert_eq!(source.calls(), 4);

    let labels = [("instance_name", "cache")];
    assert_eq!(gauge_value(&registry, TOTAL_CONNS, &labels), 12.0);
    assert_eq!(gauge_value(&registry, IDLE_CONNS, &labels), 3.0);
    assert_eq!(gauge_value(&registry, STALE_CONNS, &labels), 2.0);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling() {
    let registry = CollectorRegistry::new();
    let source = ScriptedSource::new((0..10).map(|_| Ok(snapshot(1, 1, 0))).collect());
    let handle = pool_stats(&registry).start(Arc::clone(&source)).unwrap();

    advance(INTERVAL + Duration::from_millis(1)).await;
    assert_eq!(source.calls(), 1);

    handle.shutdown().await;
    advance(INTERVAL * 5).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_parent_token_cancels_poller() {
    let registry = CollectorRegistry::new();
    let source = ScriptedSource::new(Vec::<Result<PoolSnapshot>>::new());
    let parent = CancellationToken::new();
    let handle = pool_stats(&registry)
        .start_with_token(Arc::clone(&source), parent.child_token())
        .unwrap();

    parent.cancel();
    advance(INTERVAL * 2).await;

    assert!(handle.is_finished());
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_db_stats_published_in_seconds() {
    common::init_test_logging();
    let registry = CollectorRegistry::new();
    let collector = DbStatsCollector::new(&registry, "orders", vec![with_stat_interval(INTERVAL)]).unwrap();
    let source = ScriptedSource::new(vec![Ok(DbStats {
        max_open_connections: 20,
        open_connections: 7,
        in_use: 5,
        idle: 2,
        wait_count: 3,
        wait_duration: Duration::from_millis(1500),
        max_idle_closed: 1,
        max_lifetime_closed: 4,
        max_idle_time_closed: 6,
    })]);
    let handle = collector.start(source).unwrap();

    advance(INTERVAL + Duration::from_millis(1)).await;

    let labels = [("db_name", "orders")];
    let gauge = |name: &str| gauge_value(&registry, &format!("service_component_orm_dbstats_{}", name), &labels);
    assert_eq!(gauge("max_open_connections"), 20.0);
    assert_eq!(gauge("open_connections"), 7.0);
    assert_eq!(gauge("in_use"), 5.0);
    assert_eq!(gauge("idle"), 2.0);
    assert_eq!(gauge("wait_count"), 3.0);
    assert_eq!(gauge("wait_duration"), 1.5);
    assert_eq!(gauge("max_idle_closed"), 1.0);
    assert_eq!(gauge("max_lifetime_closed"), 4.0);
    assert_eq!(gauge("max_idletime_closed"), 6.0);

    handle.shutdown().await;
}

#[test]
fn test_poll_once_reports_failure() {
    let registry = CollectorRegistry::new();
    let stats = pool_stats(&registry);

    let source = ScriptedSource::new(vec![Ok(snapshot(3, 3, 0)), Err(MonitorError::pool_stats("closed"))]);
    assert!(poll_once("kv:cache", &source, &stats));
    assert!(!poll_once("kv:cache", &source, &stats));
    assert_eq!(gauge_value(&registry, TOTAL_CONNS, &[("instance_name", "cache")]), 3.0);
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let registry = CollectorRegistry::new();
    let stats = pool_stats(&registry);
    let source = ScriptedSource::new(vec![Ok(snapshot(1, 0, 0))]);

    let result = spawn_poller(
        "kv:cache",
        Arc::clone(&source),
        stats,
        Duration::ZERO,
        CancellationToken::new(),
    );

    assert!(matches!(result, Err(MonitorError::Config(_))));
    assert_eq!(source.calls(), 0);
}
