use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::DestinationSender;
use crate::model::NotifyPayload;

/// Webhook-based Discord sender. The destination identifier is the webhook
/// URL itself, so one sender serves every tenant.
#[derive(Clone)]
pub struct DiscordSender {
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordSender {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<DiscordEmbedImage>,
}

#[derive(Serialize)]
struct DiscordEmbedImage {
    url: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_notify(payload: &NotifyPayload) -> Self {
        match payload {
            NotifyPayload::Plain(text) => Self {
                content: Some(text.clone()),
                embeds: vec![],
            },
            NotifyPayload::Rich(rich) => Self {
                content: None,
                embeds: vec![DiscordEmbed {
                    title: rich.title.clone(),
                    description: rich.description.clone(),
                    url: rich.url.clone(),
                    color: rich.color,
                    image: rich
                        .image_url
                        .clone()
                        .map(|url| DiscordEmbedImage { url }),
                }],
            },
        }
    }
}

#[async_trait]
impl DestinationSender for DiscordSender {
    async fn send(&self, destination: &str, payload: &NotifyPayload) -> Result<()> {
        let body = DiscordWebhookPayload::from_notify(payload);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(destination)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("Discord webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }
}
