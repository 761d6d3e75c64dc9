// src/source/youtube_api.rs
//
// Data API strategies. The search endpoints are the quota-expensive tiers;
// the uploads-playlist listing is the cheaper fallback the chain drops to
// under suspension.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{CostTier, FetchError, FetchStrategy};
use crate::model::{ItemKind, WatchedItem};

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

// --- wire shapes ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(rename = "liveBroadcastContent")]
    live_broadcast_content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best_url(&self) -> Option<String> {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .next()
            .map(|t| t.url.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(rename = "resourceId")]
    resource_id: PlaylistResourceId,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct PlaylistResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

fn parse_rfc3339(ts: Option<&str>) -> DateTime<Utc> {
    ts.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Map an upstream error response to the chain's failure taxonomy.
/// 403 and 429 mean quota for this API; 404 means a bad channel id.
fn classify_error_status(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => FetchError::QuotaExceeded,
        StatusCode::NOT_FOUND => FetchError::NotFound,
        other => FetchError::Transient(anyhow!("upstream status {other}: {}", body.chars().take(200).collect::<String>())),
    }
}

fn search_items_to_watched(resp: SearchResponse, channel_id: &str, kind: ItemKind) -> Vec<WatchedItem> {
    resp.items
        .into_iter()
        .filter_map(|it| {
            let video_id = it.id.video_id?;
            // A search hit flagged live by the API wins over the requested kind.
            let kind = if it.snippet.live_broadcast_content.as_deref() == Some("live") {
                ItemKind::Live
            } else {
                kind
            };
            Some(WatchedItem {
                canonical_url: WatchedItem::watch_url(&video_id),
                item_id: video_id,
                source_channel_id: it
                    .snippet
                    .channel_id
                    .unwrap_or_else(|| channel_id.to_string()),
                kind,
                title: it.snippet.title.unwrap_or_default(),
                published_at: parse_rfc3339(it.snippet.published_at.as_deref()),
                thumbnail_url: it.snippet.thumbnails.best_url(),
            })
        })
        .collect()
}

fn playlist_items_to_watched(resp: PlaylistItemsResponse, channel_id: &str) -> Vec<WatchedItem> {
    resp.items
        .into_iter()
        .filter_map(|it| {
            let video_id = it.snippet.resource_id.video_id?;
            Some(WatchedItem {
                canonical_url: WatchedItem::watch_url(&video_id),
                item_id: video_id,
                source_channel_id: it
                    .snippet
                    .channel_id
                    .unwrap_or_else(|| channel_id.to_string()),
                kind: ItemKind::Upload,
                title: it.snippet.title.unwrap_or_default(),
                published_at: parse_rfc3339(it.snippet.published_at.as_deref()),
                thumbnail_url: it.snippet.thumbnails.best_url(),
            })
        })
        .collect()
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, FetchError> {
    let t0 = std::time::Instant::now();
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("upstream request")))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(classify_error_status(status, &body));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("upstream body")))?;
    let parsed = serde_json::from_str(&body)
        .context("parsing upstream json")
        .map_err(FetchError::Transient)?;
    histogram!("watch_upstream_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("watch_upstream_calls_total").increment(1);
    Ok(parsed)
}

/// High tier: search-by-channel ordered by date. One call, many quota units.
pub struct SearchRecentStrategy {
    client: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
}

impl SearchRecentStrategy {
    pub fn new(client: Client, api_key: String, page_size: u32) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
            page_size,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for SearchRecentStrategy {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let page = self.page_size.to_string();
        let resp: SearchResponse = get_json(
            &self.client,
            &url,
            &[
                ("key", self.api_key.as_str()),
                ("part", "snippet"),
                ("channelId", channel_id),
                ("order", "date"),
                ("type", "video"),
                ("maxResults", page.as_str()),
            ],
        )
        .await?;
        Ok(search_items_to_watched(resp, channel_id, ItemKind::Upload))
    }

    fn name(&self) -> &'static str {
        "search-recent"
    }

    fn tier(&self) -> CostTier {
        CostTier::High
    }
}

/// High tier: search for broadcasts currently flagged live on the channel.
pub struct LiveSearchStrategy {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LiveSearchStrategy {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for LiveSearchStrategy {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let resp: SearchResponse = get_json(
            &self.client,
            &url,
            &[
                ("key", self.api_key.as_str()),
                ("part", "snippet"),
                ("channelId", channel_id),
                ("eventType", "live"),
                ("type", "video"),
                ("maxResults", "5"),
            ],
        )
        .await?;
        Ok(search_items_to_watched(resp, channel_id, ItemKind::Live))
    }

    fn name(&self) -> &'static str {
        "live-search"
    }

    fn tier(&self) -> CostTier {
        CostTier::High
    }
}

/// Derive the canonical "all uploads" playlist id from a channel id.
/// `UC…` channels map directly to `UU…`; anything else needs the channels
/// endpoint.
pub fn uploads_playlist_id(channel_id: &str) -> Option<String> {
    channel_id
        .strip_prefix("UC")
        .map(|rest| format!("UU{rest}"))
}

/// Medium tier: list the channel's uploads playlist. Cheap enough to run
/// while quota-suspended.
pub struct UploadsPlaylistStrategy {
    client: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
}

impl UploadsPlaylistStrategy {
    pub fn new(client: Client, api_key: String, page_size: u32) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
            page_size,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn resolve_uploads_playlist(&self, channel_id: &str) -> Result<String, FetchError> {
        if let Some(id) = uploads_playlist_id(channel_id) {
            return Ok(id);
        }
        let url = format!("{}/channels", self.base_url);
        let resp: ChannelsResponse = get_json(
            &self.client,
            &url,
            &[
                ("key", self.api_key.as_str()),
                ("part", "contentDetails"),
                ("id", channel_id),
            ],
        )
        .await?;
        resp.items
            .into_iter()
            .next()
            .and_then(|it| it.content_details.related_playlists.uploads)
            .ok_or(FetchError::NotFound)
    }
}

#[async_trait]
impl FetchStrategy for UploadsPlaylistStrategy {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        let playlist_id = self.resolve_uploads_playlist(channel_id).await?;
        let url = format!("{}/playlistItems", self.base_url);
        let page = self.page_size.to_string();
        let resp: PlaylistItemsResponse = get_json(
            &self.client,
            &url,
            &[
                ("key", self.api_key.as_str()),
                ("part", "snippet"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", page.as_str()),
            ],
        )
        .await?;
        Ok(playlist_items_to_watched(resp, channel_id))
    }

    fn name(&self) -> &'static str {
        "uploads-playlist"
    }

    fn tier(&self) -> CostTier {
        CostTier::Medium
    }
}
