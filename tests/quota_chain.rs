// tests/quota_chain.rs
//
// The expensive tier stops being called once the backoff guard opens its
// cooldown window, and the chain drops to the cheaper tier instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use stream_sentinel::diagnostics::Diagnostics;
use stream_sentinel::model::{ItemKind, WatchedItem};
use stream_sentinel::quota::QuotaGuard;
use stream_sentinel::source::{CostTier, FetchError, FetchStrategy, SourceAdapter};

struct QuotaErroringSearch {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FetchStrategy for QuotaErroringSearch {
    async fn fetch(&self, _channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::QuotaExceeded)
    }
    fn name(&self) -> &'static str {
        "quota-erroring-search"
    }
    fn tier(&self) -> CostTier {
        CostTier::High
    }
}

struct StubPlaylist {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FetchStrategy for StubPlaylist {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![WatchedItem {
            item_id: "fromPlaylist".into(),
            source_channel_id: channel_id.into(),
            kind: ItemKind::Upload,
            title: "fallback".into(),
            published_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
            thumbnail_url: None,
            canonical_url: WatchedItem::watch_url("fromPlaylist"),
        }])
    }
    fn name(&self) -> &'static str {
        "stub-playlist"
    }
    fn tier(&self) -> CostTier {
        CostTier::Medium
    }
}

#[tokio::test]
async fn three_quota_errors_suspend_the_expensive_tier_for_everyone() {
    let search_calls = Arc::new(AtomicUsize::new(0));
    let playlist_calls = Arc::new(AtomicUsize::new(0));
    let quota = Arc::new(QuotaGuard::new(3, 120, false));
    let diagnostics = Arc::new(Diagnostics::with_capacity(200));

    let adapter = SourceAdapter::new(
        vec![
            Box::new(QuotaErroringSearch {
                calls: search_calls.clone(),
            }),
            Box::new(StubPlaylist {
                calls: playlist_calls.clone(),
            }),
        ],
        vec![],
        quota.clone(),
        diagnostics.clone(),
    );

    // One tenant's channel list: three channels, each burning one quota
    // error on the expensive tier and falling through to the playlist.
    for ch in ["UC1", "UC2", "UC3"] {
        let items = adapter.fetch_recent_items(ch).await;
        assert_eq!(items.len(), 1, "fallback tier should still produce items");
    }
    assert_eq!(search_calls.load(Ordering::SeqCst), 3);
    assert!(quota.is_suspended(Utc::now()));

    // Any later poll (any tenant) skips the expensive call outright.
    let items = adapter.fetch_recent_items("UC4-other-tenant").await;
    assert_eq!(items.len(), 1);
    assert_eq!(
        search_calls.load(Ordering::SeqCst),
        3,
        "no expensive call may be issued while suspended"
    );
    assert_eq!(playlist_calls.load(Ordering::SeqCst), 4);
}

struct EmptyLiveSearch;

#[async_trait]
impl FetchStrategy for EmptyLiveSearch {
    async fn fetch(&self, _channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        Ok(vec![])
    }
    fn name(&self) -> &'static str {
        "empty-live-search"
    }
    fn tier(&self) -> CostTier {
        CostTier::High
    }
}

struct StubScrape;

#[async_trait]
impl FetchStrategy for StubScrape {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        Ok(vec![WatchedItem {
            item_id: "liveNow".into(),
            source_channel_id: channel_id.into(),
            kind: ItemKind::Live,
            title: "scraped live".into(),
            published_at: Utc::now(),
            thumbnail_url: None,
            canonical_url: WatchedItem::watch_url("liveNow"),
        }])
    }
    fn name(&self) -> &'static str {
        "stub-scrape"
    }
    fn tier(&self) -> CostTier {
        CostTier::Free
    }
}

#[tokio::test]
async fn scrape_tier_runs_only_when_live_search_is_empty() {
    let quota = Arc::new(QuotaGuard::new(3, 120, false));
    let diagnostics = Arc::new(Diagnostics::with_capacity(200));
    let adapter = SourceAdapter::new(
        vec![],
        vec![Box::new(EmptyLiveSearch), Box::new(StubScrape)],
        quota,
        diagnostics,
    );

    let items = adapter.fetch_recent_items("UCx").await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_id, "liveNow");
    assert_eq!(items[0].kind, ItemKind::Live);
}

#[tokio::test]
async fn merged_result_classifies_shared_id_as_live() {
    struct UploadBoth;
    #[async_trait]
    impl FetchStrategy for UploadBoth {
        async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
            Ok(["vidShared", "vidOnlyUpload"]
                .into_iter()
                .map(|id| WatchedItem {
                    item_id: id.into(),
                    source_channel_id: channel_id.into(),
                    kind: ItemKind::Upload,
                    title: id.into(),
                    published_at: Utc::now(),
                    thumbnail_url: None,
                    canonical_url: WatchedItem::watch_url(id),
                })
                .collect())
        }
        fn name(&self) -> &'static str {
            "upload-both"
        }
        fn tier(&self) -> CostTier {
            CostTier::Medium
        }
    }

    struct LiveShared;
    #[async_trait]
    impl FetchStrategy for LiveShared {
        async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
            Ok(vec![WatchedItem {
                item_id: "vidShared".into(),
                source_channel_id: channel_id.into(),
                kind: ItemKind::Live,
                title: "vidShared".into(),
                published_at: Utc::now(),
                thumbnail_url: None,
                canonical_url: WatchedItem::watch_url("vidShared"),
            }])
        }
        fn name(&self) -> &'static str {
            "live-shared"
        }
        fn tier(&self) -> CostTier {
            CostTier::Free
        }
    }

    let adapter = SourceAdapter::new(
        vec![Box::new(UploadBoth)],
        vec![Box::new(LiveShared)],
        Arc::new(QuotaGuard::new(3, 120, false)),
        Arc::new(Diagnostics::with_capacity(200)),
    );

    let items = adapter.fetch_recent_items("UCx").await;
    assert_eq!(items.len(), 2);
    let shared = items.iter().find(|it| it.item_id == "vidShared").unwrap();
    assert_eq!(shared.kind, ItemKind::Live, "live classification wins");
    let upload_only = items.iter().find(|it| it.item_id == "vidOnlyUpload").unwrap();
    assert_eq!(upload_only.kind, ItemKind::Upload);
}
