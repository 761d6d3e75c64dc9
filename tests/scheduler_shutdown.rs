// tests/scheduler_shutdown.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;

use stream_sentinel::diagnostics::Diagnostics;
use stream_sentinel::ledger::DedupLedger;
use stream_sentinel::model::{NotifyPayload, TenantWatchConfig};
use stream_sentinel::notify::{DestinationSender, Dispatcher};
use stream_sentinel::quota::QuotaGuard;
use stream_sentinel::scheduler::Scheduler;
use stream_sentinel::source::SourceAdapter;
use stream_sentinel::tenants::{TenantConfigProvider, TenantId};

struct NoTenants;

#[async_trait]
impl TenantConfigProvider for NoTenants {
    async fn tenants(&self) -> Result<Vec<(TenantId, TenantWatchConfig)>> {
        Ok(vec![])
    }
}

struct NullSender;

#[async_trait]
impl DestinationSender for NullSender {
    async fn send(&self, _destination: &str, _payload: &NotifyPayload) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn shutdown_signal_stops_the_loop_after_the_pass() {
    let n: u64 = rand::rng().random();
    let path = std::env::temp_dir().join(format!("sentinel-shutdown-{n}.json"));

    let diagnostics = Arc::new(Diagnostics::with_capacity(200));
    let scheduler = Scheduler::new(
        Arc::new(NoTenants),
        Arc::new(SourceAdapter::new(
            vec![],
            vec![],
            Arc::new(QuotaGuard::new(3, 120, false)),
            diagnostics.clone(),
        )),
        Arc::new(DedupLedger::new(&path, 50)),
        Arc::new(Dispatcher::new(Arc::new(NullSender), diagnostics.clone())),
        diagnostics.clone(),
        60,
        4,
    );

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { scheduler.run(rx).await });

    // Let the first pass complete, then request shutdown mid-sleep.
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop after shutdown signal")
        .unwrap();

    assert!(diagnostics
        .snapshot_last_n(10)
        .iter()
        .any(|ev| ev.message.contains("scheduler stopped")));

    // The first pass flushed the (empty) ledger before sleeping.
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);
}
