//! Stream Sentinel — Binary Entrypoint
//! Boots the poll scheduler and the operator stats surface, wiring the
//! strategy chains, quota guard, ledger, and dispatcher together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_sentinel::api::{create_router, AppState};
use stream_sentinel::diagnostics::Diagnostics;
use stream_sentinel::ledger::DedupLedger;
use stream_sentinel::metrics::Metrics;
use stream_sentinel::notify::{discord::DiscordSender, Dispatcher};
use stream_sentinel::quota::QuotaGuard;
use stream_sentinel::scheduler::Scheduler;
use stream_sentinel::settings::Settings;
use stream_sentinel::source::{
    feed::PublicFeedStrategy,
    scrape::LivePageScrapeStrategy,
    youtube_api::{LiveSearchStrategy, SearchRecentStrategy, UploadsPlaylistStrategy},
    FetchStrategy, SourceAdapter,
};
use stream_sentinel::tenants::FileTenantProvider;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stream_sentinel=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Assemble the upload and live strategy chains from settings: cheapest
/// last, free tiers only when explicitly opted in.
fn build_chains(
    settings: &Settings,
    client: &reqwest::Client,
) -> (Vec<Box<dyn FetchStrategy>>, Vec<Box<dyn FetchStrategy>>) {
    let mut upload_chain: Vec<Box<dyn FetchStrategy>> = Vec::new();
    let mut live_chain: Vec<Box<dyn FetchStrategy>> = Vec::new();

    if let Some(key) = &settings.api_key {
        upload_chain.push(Box::new(SearchRecentStrategy::new(
            client.clone(),
            key.clone(),
            settings.search_page_size,
        )));
        upload_chain.push(Box::new(UploadsPlaylistStrategy::new(
            client.clone(),
            key.clone(),
            settings.search_page_size,
        )));
        live_chain.push(Box::new(LiveSearchStrategy::new(
            client.clone(),
            key.clone(),
        )));
    }
    if settings.enable_feed_fallback {
        upload_chain.push(Box::new(PublicFeedStrategy::new(client.clone())));
    }
    if settings.enable_scrape_fallback {
        live_chain.push(Box::new(LivePageScrapeStrategy::new(client.clone())));
    }
    (upload_chain, live_chain)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env().context("loading settings")?;
    let metrics = Metrics::init();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("stream-sentinel/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let diagnostics = Arc::new(Diagnostics::with_capacity(200));
    let quota = Arc::new(QuotaGuard::new(
        settings.quota_error_threshold,
        settings.quota_cooldown_minutes,
        settings.low_quota_mode,
    ));
    let ledger = Arc::new(DedupLedger::load(&settings.ledger_path, settings.dedup_capacity).await);

    let (upload_chain, live_chain) = build_chains(&settings, &client);
    let adapter = Arc::new(SourceAdapter::new(
        upload_chain,
        live_chain,
        quota.clone(),
        diagnostics.clone(),
    ));

    let sender = Arc::new(DiscordSender::new(client.clone()));
    let dispatcher = Arc::new(Dispatcher::new(sender, diagnostics.clone()));
    let provider = Arc::new(FileTenantProvider::new(&settings.tenants_path));

    let scheduler = Scheduler::new(
        provider,
        adapter,
        ledger.clone(),
        dispatcher,
        diagnostics.clone(),
        settings.min_poll_interval_secs,
        settings.tenant_concurrency,
    );

    // Stats surface runs beside the watcher; it only reads shared state.
    let state = AppState {
        diagnostics: diagnostics.clone(),
        quota: quota.clone(),
        ledger: ledger.clone(),
    };
    let router = create_router(state).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&settings.stats_bind_addr)
        .await
        .with_context(|| format!("binding stats surface to {}", settings.stats_bind_addr))?;
    tracing::info!(addr = %settings.stats_bind_addr, "stats surface listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::warn!(error = ?e, "stats surface exited");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, finishing in-flight pass");
            let _ = shutdown_tx.send(true);
        }
    });

    diagnostics.info("watcher started");
    scheduler.run(shutdown_rx).await;
    Ok(())
}
