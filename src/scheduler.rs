// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::diagnostics::Diagnostics;
use crate::ledger::DedupLedger;
use crate::model::TenantWatchConfig;
use crate::notify::Dispatcher;
use crate::source::SourceAdapter;
use crate::tenants::TenantConfigProvider;

/// Top-level poll loop. One pass walks every enabled tenant, reconciles the
/// fetched items against the dedup ledger, dispatches what is new, flushes
/// the ledger, then sleeps for the minimum configured interval.
///
/// Passes never overlap: the loop awaits a full pass (including the flush)
/// before sleeping, which is what makes check-then-record per channel safe.
pub struct Scheduler {
    provider: Arc<dyn TenantConfigProvider>,
    adapter: Arc<SourceAdapter>,
    ledger: Arc<DedupLedger>,
    dispatcher: Arc<Dispatcher>,
    diagnostics: Arc<Diagnostics>,
    min_interval_secs: u64,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn TenantConfigProvider>,
        adapter: Arc<SourceAdapter>,
        ledger: Arc<DedupLedger>,
        dispatcher: Arc<Dispatcher>,
        diagnostics: Arc<Diagnostics>,
        min_interval_secs: u64,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            adapter,
            ledger,
            dispatcher,
            diagnostics,
            min_interval_secs: min_interval_secs.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Loop until `shutdown` flips to true. An in-flight pass always
    /// finishes (and flushes) before the loop returns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let sleep_secs = self.run_pass().await;

            if let Err(e) = self.ledger.flush().await {
                tracing::warn!(error = ?e, "ledger flush failed");
                self.diagnostics
                    .error(format!("ledger flush failed: {e:#}"));
            }

            tracing::debug!(sleep_secs, "pass complete, sleeping");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
        self.diagnostics.info("scheduler stopped");
    }

    /// One pass over all enabled tenants. Returns the next sleep interval:
    /// the minimum poll interval across enabled tenants, floored at the
    /// configured safety minimum.
    pub async fn run_pass(&self) -> u64 {
        counter!("watch_passes_total").increment(1);

        let tenants = match self.provider.tenants().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = ?e, "tenant config unavailable, skipping pass");
                self.diagnostics
                    .error(format!("tenant config unavailable: {e:#}"));
                return self.min_interval_secs;
            }
        };

        let enabled: Vec<(String, TenantWatchConfig)> = tenants
            .into_iter()
            .filter(|(_, cfg)| cfg.enabled)
            .collect();
        gauge!("watch_enabled_tenants").set(enabled.len() as f64);

        let next_interval = enabled
            .iter()
            .map(|(_, cfg)| cfg.poll_interval_secs)
            .min()
            .unwrap_or(self.min_interval_secs)
            .max(self.min_interval_secs);

        if enabled.is_empty() {
            tracing::debug!("no enabled tenants");
            return next_interval;
        }

        // Tenants fan out over a bounded pool; channels within one tenant
        // stay sequential to bound concurrent upstream load.
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        for (tenant_id, cfg) in enabled {
            let semaphore = semaphore.clone();
            let adapter = self.adapter.clone();
            let ledger = self.ledger.clone();
            let dispatcher = self.dispatcher.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                process_tenant(&tenant_id, &cfg, &adapter, &ledger, &dispatcher).await;
            });
        }
        let mut polled = 0usize;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(()) => polled += 1,
                Err(e) => {
                    // A panicked tenant task must not abort the rest of the pass.
                    tracing::warn!(error = ?e, "tenant task failed");
                    self.diagnostics.error(format!("tenant task failed: {e}"));
                }
            }
        }
        self.diagnostics
            .info(format!("pass complete: {polled} tenants polled"));

        next_interval
    }
}

async fn process_tenant(
    tenant_id: &str,
    cfg: &TenantWatchConfig,
    adapter: &SourceAdapter,
    ledger: &DedupLedger,
    dispatcher: &Dispatcher,
) {
    for channel in &cfg.channels {
        let items = adapter.fetch_recent_items(channel).await;
        counter!("watch_items_seen_total").increment(items.len() as u64);
        for item in items {
            if !ledger.is_new(tenant_id, channel, item.kind, &item.item_id) {
                continue;
            }
            // Record before dispatch: a crash mid-dispatch loses at most
            // this one notification rather than duplicating it within the
            // process lifetime. Re-announcement after a crash before the
            // end-of-pass flush is the accepted at-least-once trade-off.
            ledger.record(tenant_id, channel, item.kind, &item.item_id);
            let template = cfg.template_for(channel, item.kind).to_string();
            dispatcher
                .dispatch(tenant_id, &cfg.destination, &template, &item, cfg)
                .await;
        }
    }
}
