//! Pool statistics of a real sqlx pool
#![cfg(feature = "sqlite")]

mod common;

use common::gauge_value;
use monitorit_lib::orm::DbStatsCollector;
use monitorit_lib::{poll_once, CollectorRegistry, MonitorError, PoolStatsSource};
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::test]
async fn test_sqlite_pool_stats() {
    common::init_test_logging();
    let pool = SqlitePoolOptions::new()
        .max_connections(3)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let stats = pool.pool_stats().unwrap();
    assert_eq!(stats.max_open_connections, 3);
    assert!(stats.open_connections >= 1);
    assert_eq!(stats.open_connections, stats.in_use + stats.idle);

    let registry = CollectorRegistry::new();
    let collector = DbStatsCollector::new(&registry, "memory", Vec::new()).unwrap();
    assert!(poll_once("orm:memory", &pool, &collector));
    assert_eq!(
        gauge_value(
            &registry,
            "service_component_orm_dbstats_max_open_connections",
            &[("db_name", "memory")]
        ),
        3.0
    );

    pool.close().await;
    assert!(matches!(pool.pool_stats(), Err(MonitorError::PoolStats(_))));
}
