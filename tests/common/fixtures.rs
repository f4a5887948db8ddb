//! Engine and store fixtures
//!
//! Tests use real SQLite stores (in memory, or in a temp dir when a restart
//! is simulated) and millisecond retry delays so exhausting a mutation's
//! budget stays fast.

use crate::common::remote::RecordingApi;
use fieldsync::engine::OfflineEngine;
use fieldsync::local_db::LocalDatabase;
use fieldsync::shared::AppConfig;
use fieldsync::sync::{DrainReport, NetworkStatus, NoopRegistrar};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Config with fast retries and a periodic trigger that never fires in a test
pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .server_url("http://127.0.0.1:9")
        .retry_delays(vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(3),
        ])
        .sync_interval(Duration::from_secs(3600))
        .request_timeout(Duration::from_secs(5))
        .build()
        .expect("test config is valid")
}

pub async fn memory_db() -> Arc<LocalDatabase> {
    Arc::new(LocalDatabase::open_in_memory().await.expect("in-memory store"))
}

pub async fn file_db(path: &Path) -> Arc<LocalDatabase> {
    Arc::new(LocalDatabase::open(path).await.expect("on-disk store"))
}

pub async fn engine_with(
    db: Arc<LocalDatabase>,
    api: Arc<RecordingApi>,
    status: NetworkStatus,
) -> OfflineEngine {
    OfflineEngine::with_parts(test_config(), db, api, Arc::new(NoopRegistrar), status)
        .await
        .expect("engine assembles")
}

/// Wait for the next completed drain pass
pub async fn next_report(reports: &mut watch::Receiver<DrainReport>) -> DrainReport {
    tokio::time::timeout(Duration::from_secs(10), reports.changed())
        .await
        .expect("no drain pass completed in time")
        .expect("sync manager dropped");
    reports.borrow_and_update().clone()
}
