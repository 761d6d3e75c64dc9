// src/source/feed.rs
//
// Public syndication feed tier: no quota cost, reduced fidelity (the feed
// cannot distinguish lives from uploads). Opt-in last resort.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{CostTier, FetchError, FetchStrategy};
use crate::model::{ItemKind, WatchedItem};

const FEED_BASE: &str = "https://www.youtube.com/feeds/videos.xml";

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

// quick-xml strips namespace prefixes from element names.
#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    title: Option<String>,
    published: Option<String>,
    #[serde(rename = "group")]
    media_group: Option<MediaGroup>,
}

#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "thumbnail")]
    thumbnail: Option<MediaThumbnail>,
}

#[derive(Debug, Deserialize)]
struct MediaThumbnail {
    #[serde(rename = "@url")]
    url: Option<String>,
}

fn parse_rfc3339(ts: Option<&str>) -> DateTime<Utc> {
    ts.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Parse an Atom channel feed into items. Every entry is reported as an
/// upload; the live chain has its own tiers.
pub fn parse_feed(xml: &str, channel_id: &str) -> anyhow::Result<Vec<WatchedItem>> {
    let t0 = std::time::Instant::now();
    let feed: Feed = from_str(xml).context("parsing channel feed xml")?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let Some(video_id) = entry.video_id else {
            continue;
        };
        let title = entry
            .title
            .map(|t| html_escape::decode_html_entities(&t).trim().to_string())
            .unwrap_or_default();
        out.push(WatchedItem {
            canonical_url: WatchedItem::watch_url(&video_id),
            source_channel_id: channel_id.to_string(),
            kind: ItemKind::Upload,
            title,
            published_at: parse_rfc3339(entry.published.as_deref()),
            thumbnail_url: entry.media_group.and_then(|g| g.thumbnail).and_then(|t| t.url),
            item_id: video_id,
        });
    }

    histogram!("watch_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("watch_feed_entries_total").increment(out.len() as u64);
    Ok(out)
}

pub struct PublicFeedStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl PublicFeedStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: FEED_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for PublicFeedStrategy {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<WatchedItem>, FetchError> {
        let url = format!("{}?channel_id={channel_id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("feed get")))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            // Host-side rate limiting, not API quota; keep it transient.
            return Err(FetchError::Transient(anyhow::anyhow!(
                "feed status {status}"
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(anyhow::Error::new(e).context("feed body")))?;
        parse_feed(&body, channel_id).map_err(FetchError::Transient)
    }

    fn name(&self) -> &'static str {
        "public-feed"
    }

    fn tier(&self) -> CostTier {
        CostTier::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015"
      xmlns:media="http://search.yahoo.com/mrss/"
      xmlns="http://www.w3.org/2005/Atom">
  <title>Channel uploads</title>
  <entry>
    <id>yt:video:vidA</id>
    <yt:videoId>vidA</yt:videoId>
    <title>Fresh &amp; new</title>
    <published>2025-09-06T09:00:00+00:00</published>
    <media:group>
      <media:thumbnail url="https://i.ytimg.test/vidA/hq.jpg" width="480" height="360"/>
    </media:group>
  </entry>
  <entry>
    <id>yt:video:vidB</id>
    <yt:videoId>vidB</yt:videoId>
    <title>Older one</title>
    <published>2025-09-05T08:00:00+00:00</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_decodes_entities() {
        let items = parse_feed(SAMPLE, "UCx").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "vidA");
        assert_eq!(items[0].title, "Fresh & new");
        assert_eq!(items[0].kind, ItemKind::Upload);
        assert_eq!(
            items[0].thumbnail_url.as_deref(),
            Some("https://i.ytimg.test/vidA/hq.jpg")
        );
        assert!(items[1].thumbnail_url.is_none());
    }

    #[test]
    fn bad_xml_is_an_error() {
        assert!(parse_feed("<not-a-feed", "UCx").is_err());
    }
}
