// src/source/mod.rs
pub mod feed;
pub mod scrape;
pub mod youtube_api;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;

use crate::diagnostics::Diagnostics;
use crate::model::{ItemKind, WatchedItem};
use crate::quota::QuotaGuard;

/// Why a strategy failed. The chain walk dispatches on this: quota errors
/// feed the backoff guard, everything else just falls through to the next
/// tier.
#[derive(Debug)]
pub enum FetchError {
    QuotaExceeded,
    NotFound,
    Transient(anyhow::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::QuotaExceeded => write!(f, "quota exceeded"),
            FetchError::NotFound => write!(f, "channel not found"),
            FetchError::Transient(e) => write!(f, "transient: {e:#}"),
        }
    }
}

/// Relative upstream cost of a strategy. High tiers burn API quota and are
/// skipped wholesale while the guard reports suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostTier {
    High,
    Medium,
    Free,
}

/// One concrete way of fetching recent items for a channel.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError>;
    fn name(&self) -> &'static str;
    fn tier(&self) -> CostTier;
}

/// Merge rule: start from the upload-chain result; any id also observed by
/// the live chain is reclassified as live, unseen live ids are inserted.
/// A currently-live broadcast is never left classified as a plain upload.
pub fn merge_items(uploads: Vec<WatchedItem>, lives: Vec<WatchedItem>) -> Vec<WatchedItem> {
    let mut map: HashMap<String, WatchedItem> = HashMap::with_capacity(uploads.len());
    let mut order: Vec<String> = Vec::with_capacity(uploads.len());
    for up in uploads {
        if !map.contains_key(&up.item_id) {
            order.push(up.item_id.clone());
        }
        map.insert(up.item_id.clone(), up);
    }
    for live in lives {
        match map.get_mut(&live.item_id) {
            Some(existing) => {
                existing.kind = ItemKind::Live;
            }
            None => {
                order.push(live.item_id.clone());
                map.insert(live.item_id.clone(), live);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|id| map.remove(&id))
        .collect()
}

/// Executes the upload and live strategy chains for one channel and merges
/// the results. Best-effort: total failure yields an empty list, never an
/// error to the caller.
pub struct SourceAdapter {
    upload_chain: Vec<Box<dyn FetchStrategy>>,
    live_chain: Vec<Box<dyn FetchStrategy>>,
    quota: Arc<QuotaGuard>,
    diagnostics: Arc<Diagnostics>,
}

impl SourceAdapter {
    pub fn new(
        upload_chain: Vec<Box<dyn FetchStrategy>>,
        live_chain: Vec<Box<dyn FetchStrategy>>,
        quota: Arc<QuotaGuard>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            upload_chain,
            live_chain,
            quota,
            diagnostics,
        }
    }

    pub async fn fetch_recent_items(&self, channel_id: &str) -> Vec<WatchedItem> {
        // The two chains are independent reads; run them concurrently.
        let (uploads, lives) = tokio::join!(
            self.walk_chain(&self.upload_chain, channel_id),
            self.walk_chain(&self.live_chain, channel_id),
        );
        merge_items(uploads, lives)
    }

    /// Walk one chain top-down. Quota-suspended high tiers are skipped
    /// before any network call; a quota error falls through immediately
    /// with no same-tier retry.
    async fn walk_chain(
        &self,
        chain: &[Box<dyn FetchStrategy>],
        channel_id: &str,
    ) -> Vec<WatchedItem> {
        for strategy in chain {
            if strategy.tier() == CostTier::High && self.quota.is_suspended(Utc::now()) {
                tracing::debug!(
                    strategy = strategy.name(),
                    channel = channel_id,
                    "skipping expensive tier while quota-suspended"
                );
                counter!("watch_tier_skips_total").increment(1);
                continue;
            }
            match strategy.fetch(channel_id).await {
                Ok(items) => {
                    if strategy.tier() == CostTier::High {
                        self.quota.note_success();
                    }
                    if !items.is_empty() {
                        counter!("watch_fetch_items_total").increment(items.len() as u64);
                        return items;
                    }
                    // Empty success: let a lower tier have a look.
                }
                Err(FetchError::QuotaExceeded) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        channel = channel_id,
                        "quota exceeded, falling through"
                    );
                    counter!("watch_quota_errors_total").increment(1);
                    let now = Utc::now();
                    let was_suspended = self.quota.is_suspended(now);
                    self.quota.note_quota_error(now);
                    self.diagnostics
                        .warn(format!("{}: quota exceeded on {channel_id}", strategy.name()));
                    if !was_suspended && self.quota.is_suspended(now) {
                        self.diagnostics
                            .warn("quota cooldown opened, expensive tiers suspended");
                    }
                }
                Err(FetchError::NotFound) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        channel = channel_id,
                        "channel not found"
                    );
                    self.diagnostics
                        .warn(format!("{}: channel {channel_id} not found", strategy.name()));
                }
                Err(FetchError::Transient(e)) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        channel = channel_id,
                        error = ?e,
                        "fetch failed, falling through"
                    );
                    counter!("watch_fetch_errors_total").increment(1);
                    self.diagnostics
                        .warn(format!("{}: fetch failed for {channel_id}: {e:#}", strategy.name()));
                }
            }
        }
        Vec::new()
    }
}
