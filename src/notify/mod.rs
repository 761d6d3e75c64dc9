// src/notify/mod.rs
pub mod discord;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::model::{MentionTarget, NotifyPayload, RichPayload, TenantWatchConfig, WatchedItem};

/// Delivery boundary. Failures come back as errors; callers log and move on.
#[async_trait]
pub trait DestinationSender: Send + Sync {
    async fn send(&self, destination: &str, payload: &NotifyPayload) -> Result<()>;
}

fn re_placeholder() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\{[A-Za-z0-9_]+\}").unwrap())
}

/// Literal placeholder substitution. Unknown `{tokens}` render as empty
/// string, never as the literal placeholder syntax.
pub fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let out = re_placeholder().replace_all(template, |caps: &regex::Captures<'_>| {
        let token = caps.get(0).unwrap().as_str();
        let key = &token[1..token.len() - 1];
        vars.get(key).cloned().unwrap_or_default()
    });
    out.trim().to_string()
}

/// Render a mention list to destination syntax, space-joined, deduplicating
/// identical rendered tokens while preserving first-occurrence order.
pub fn render_mentions(targets: &[MentionTarget]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for t in targets {
        let rendered = t.render();
        if seen.insert(rendered.clone()) {
            out.push(rendered);
        }
    }
    out.join(" ")
}

/// Post-render augmentation for plain delivery, applied in order:
/// 1. empty text → the canonical URL stands in for the whole message;
/// 2. template omitted the thumbnail and the item has one → append the link.
pub fn augment_plain_text(rendered: String, item: &WatchedItem) -> String {
    let mut text = rendered;
    if text.is_empty() {
        text = item.canonical_url.clone();
    }
    if let Some(thumb) = &item.thumbnail_url {
        if !text.contains(thumb.as_str()) {
            text.push(' ');
            text.push_str(thumb);
        }
    }
    text
}

fn template_vars(item: &WatchedItem, cfg: &TenantWatchConfig) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("channelName", item.source_channel_id.clone());
    vars.insert("streamerName", item.source_channel_id.clone());
    vars.insert("title", item.title.clone());
    vars.insert("url", item.canonical_url.clone());
    vars.insert("mentions", render_mentions(&cfg.mentions));
    vars.insert("thumbnail", item.thumbnail_url.clone().unwrap_or_default());
    vars
}

/// Render + choose delivery mode for one item.
pub fn build_payload(item: &WatchedItem, cfg: &TenantWatchConfig, template: &str) -> NotifyPayload {
    let vars = template_vars(item, cfg);
    let rendered = render_template(template, &vars);
    if cfg.rich_embeds {
        NotifyPayload::Rich(RichPayload {
            title: item.title.clone(),
            description: rendered,
            url: item.canonical_url.clone(),
            image_url: item.thumbnail_url.clone(),
            color: item.kind.embed_color(),
        })
    } else {
        NotifyPayload::Plain(augment_plain_text(rendered, item))
    }
}

/// Best-effort dispatcher: one tenant's delivery failure never aborts the
/// cycle for the others.
pub struct Dispatcher {
    sender: Arc<dyn DestinationSender>,
    diagnostics: Arc<Diagnostics>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn DestinationSender>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            sender,
            diagnostics,
        }
    }

    pub async fn dispatch(
        &self,
        tenant: &str,
        destination: &str,
        template: &str,
        item: &WatchedItem,
        cfg: &TenantWatchConfig,
    ) {
        let payload = build_payload(item, cfg, template);
        match self.sender.send(destination, &payload).await {
            Ok(()) => {
                counter!("watch_dispatches_total").increment(1);
                tracing::info!(
                    tenant,
                    item = %item.item_id,
                    kind = ?item.kind,
                    "notification dispatched"
                );
            }
            Err(e) => {
                counter!("watch_dispatch_failures_total").increment(1);
                tracing::warn!(tenant, item = %item.item_id, error = ?e, "dispatch failed");
                self.diagnostics.error(format!(
                    "dispatch failed for tenant {tenant}, item {}: {e:#}",
                    item.item_id
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use chrono::{TimeZone, Utc};

    fn item() -> WatchedItem {
        WatchedItem {
            item_id: "vid1".into(),
            source_channel_id: "Foo".into(),
            kind: ItemKind::Live,
            title: "Launch day".into(),
            published_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
            thumbnail_url: Some("https://i.ytimg.test/vid1/hq.jpg".into()),
            canonical_url: "https://x/y".into(),
        }
    }

    #[test]
    fn known_placeholders_render_exactly() {
        let mut vars = HashMap::new();
        vars.insert("streamerName", "Foo".to_string());
        vars.insert("url", "https://x/y".to_string());
        let out = render_template("{streamerName} is live: {url}", &vars);
        assert_eq!(out, "Foo is live: https://x/y");
    }

    #[test]
    fn unknown_placeholders_render_empty() {
        let vars = HashMap::new();
        let out = render_template("hello {nope} world {alsoNope}", &vars);
        assert_eq!(out, "hello  world");
    }

    #[test]
    fn mentions_dedup_preserving_order() {
        let targets = vec![
            MentionTarget::Everyone,
            MentionTarget::Role("123456789012345678".into()),
            MentionTarget::Role("123456789012345678".into()),
        ];
        assert_eq!(
            render_mentions(&targets),
            "@everyone <@&123456789012345678>"
        );
    }

    #[test]
    fn empty_render_falls_back_to_url_and_thumbnail() {
        let it = item();
        let out = augment_plain_text(String::new(), &it);
        assert_eq!(out, "https://x/y https://i.ytimg.test/vid1/hq.jpg");
    }

    #[test]
    fn thumbnail_appended_when_template_omits_it() {
        let it = item();
        let out = augment_plain_text("Foo is live https://x/y".to_string(), &it);
        assert_eq!(out, "Foo is live https://x/y https://i.ytimg.test/vid1/hq.jpg");
        // Already present: no double append.
        let again = augment_plain_text(out.clone(), &it);
        assert_eq!(again, out);
    }

    #[test]
    fn rich_payload_colors_by_kind() {
        let it = item();
        let cfg = TenantWatchConfig {
            enabled: true,
            channels: vec![],
            destination: "d".into(),
            upload_template: String::new(),
            live_template: "{channelName} live {url}".into(),
            channel_templates: HashMap::new(),
            poll_interval_secs: 300,
            rich_embeds: true,
            mentions: vec![],
        };
        match build_payload(&it, &cfg, &cfg.live_template) {
            NotifyPayload::Rich(rich) => {
                assert_eq!(rich.color, ItemKind::Live.embed_color());
                assert_eq!(rich.url, "https://x/y");
                assert_eq!(
                    rich.image_url.as_deref(),
                    Some("https://i.ytimg.test/vid1/hq.jpg")
                );
            }
            other => panic!("expected rich payload, got {other:?}"),
        }
    }
}
