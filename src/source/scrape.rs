// src/source/scrape.rs
//
// Live-page scrape tier: zero quota, best-effort, explicitly opt-in. Fetches
// the channel's /live page and looks for the schema.org live-broadcast
// marker the page embeds while a stream is up.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;

use super::{CostTier, FetchError, FetchStrategy};
use crate::model::{ItemKind, WatchedItem};

const LIVE_MARKER: &str = "\"isLiveBroadcast\"";

fn re_video_id() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#""videoId"\s*:\s*"([A-Za-z0-9_-]{6,})""#).unwrap())
}

fn re_title() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"<meta\s+name="title"\s+content="([^"]*)""#).unwrap())
}

/// Deterministic live-thumbnail URL for a video id.
pub fn live_thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault_live.jpg")
}

/// Extract the currently-live item from a /live page body, if the live
/// marker is present. `None` when the channel is not live.
pub fn extract_live_item(body: &str, channel_id: &str) -> Option<WatchedItem> {
    if !body.contains(LIVE_MARKER) {
        return None;
    }
    let video_id = re_video_id().captures(body)?.get(1)?.as_str().to_string();
    let title = re_title()
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
        .unwrap_or_default();
    Some(WatchedItem {
        canonical_url: WatchedItem::watch_url(&video_id),
        thumbnail_url: Some(live_thumbnail_url(&video_id)),
        source_channel_id: channel_id.to_string(),
        kind: ItemKind::Live,
        title,
        published_at: Utc::now(),
        item_id: video_id,
    })
}

pub struct LivePageScrapeStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl LivePageScrapeStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://www.youtube.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for LivePageScrapeStrategy {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        let url = format!("{}/channel/{channel_id}/live", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("live page get")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("live page body")))?;
        Ok(extract_live_item(&body, channel_id).into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "live-page-scrape"
    }

    fn tier(&self) -> CostTier {
        CostTier::Free
    }
}
