// src/model.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of item a channel produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Upload,
    Live,
}

impl ItemKind {
    /// Embed accent color used for rich delivery.
    pub fn embed_color(self) -> u32 {
        match self {
            ItemKind::Live => 0xED4245,   // red
            ItemKind::Upload => 0x3498DB, // blue
        }
    }
}

/// One upload or live broadcast observed on a source channel.
///
/// `item_id` is the platform's stable, globally unique identifier (a video
/// id). `kind` may be reclassified from `Upload` to `Live` within a single
/// poll cycle when the same id shows up in both chains — live wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedItem {
    pub item_id: String,
    pub source_channel_id: String,
    pub kind: ItemKind,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
    pub canonical_url: String,
}

impl WatchedItem {
    /// Canonical watch URL derived from a video id.
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}

/// One entry in a tenant's mention list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionTarget {
    Everyone,
    Here,
    Role(String),
}

impl MentionTarget {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "everyone" | "@everyone" => MentionTarget::Everyone,
            "here" | "@here" => MentionTarget::Here,
            other => MentionTarget::Role(other.to_string()),
        }
    }

    /// Destination-platform mention syntax.
    pub fn render(&self) -> String {
        match self {
            MentionTarget::Everyone => "@everyone".to_string(),
            MentionTarget::Here => "@here".to_string(),
            MentionTarget::Role(id) => format!("<@&{id}>"),
        }
    }
}

impl<'de> Deserialize<'de> for MentionTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(MentionTarget::parse(&s))
    }
}

impl Serialize for MentionTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            MentionTarget::Everyone => "everyone".to_string(),
            MentionTarget::Here => "here".to_string(),
            MentionTarget::Role(id) => id.clone(),
        };
        serializer.serialize_str(&s)
    }
}

fn default_poll_interval() -> u64 {
    300
}

/// Per-tenant watch configuration, owned by the tenant config provider and
/// read-only to the watcher core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantWatchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Destination identifier; for the Discord sender this is a webhook URL.
    pub destination: String,
    #[serde(default = "default_upload_template")]
    pub upload_template: String,
    #[serde(default = "default_live_template")]
    pub live_template: String,
    /// Optional per-channel template overrides, keyed by source channel id.
    #[serde(default)]
    pub channel_templates: HashMap<String, String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub rich_embeds: bool,
    #[serde(default)]
    pub mentions: Vec<MentionTarget>,
}

fn default_upload_template() -> String {
    "{mentions} {channelName} uploaded: {title} {url}".to_string()
}

fn default_live_template() -> String {
    "{mentions} {channelName} is live: {title} {url}".to_string()
}

impl TenantWatchConfig {
    /// Template to use for `channel` and `kind`: a per-channel override wins
    /// over the per-kind default.
    pub fn template_for(&self, channel: &str, kind: ItemKind) -> &str {
        if let Some(t) = self.channel_templates.get(channel) {
            return t;
        }
        match kind {
            ItemKind::Upload => &self.upload_template,
            ItemKind::Live => &self.live_template,
        }
    }
}

/// Payload handed to a destination sender.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyPayload {
    Plain(String),
    Rich(RichPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RichPayload {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub color: u32,
}
