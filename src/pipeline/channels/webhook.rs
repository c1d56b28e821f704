//! Chat webhook channel.
//!
//! Posts a `{content, username}` payload to a per-project Discord-style
//! webhook URL. The URL is validated against a fixed pattern at
//! construction; an invalid URL disables the channel instead of failing at
//! dispatch time.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::{Channel, ChannelResult};
use crate::config::WebhookConfig;
use crate::events::NotificationEvent;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://(discord\.com|discordapp\.com)/api/webhooks/\d+/[\w-]+$")
            .expect("webhook url pattern is valid")
    })
}

pub fn is_valid_webhook_url(url: &str) -> bool {
    url_pattern().is_match(url)
}

pub struct WebhookChannel {
    url: Option<String>,
    username: String,
    client: Client,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig) -> Self {
        let url = if !config.enabled {
            None
        } else if is_valid_webhook_url(&config.url) {
            Some(config.url.clone())
        } else {
            if !config.url.is_empty() {
                warn!("Webhook URL does not match the expected format, channel disabled");
            }
            None
        };

        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url,
            username: config.username.clone(),
            client,
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn dispatch(&self, summary: &str, event: &NotificationEvent) -> ChannelResult {
        let t0 = Instant::now();
        let Some(url) = &self.url else {
            return ChannelResult::failed(self.name(), "channel disabled", 0);
        };

        let content = format!(
            "**{}** finished after {:.1}s\n{summary}",
            event.label(),
            event.duration_ms as f64 / 1000.0
        );
        let body = json!({
            "content": content,
            "username": self.username,
        });

        match self.client.post(url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Webhook delivered for {}", event.transaction_id);
                ChannelResult::ok(self.name(), t0.elapsed().as_millis() as u64)
            }
            Ok(resp) => {
                let status = resp.status();
                warn!("Webhook returned status {status}");
                ChannelResult::failed(
                    self.name(),
                    format!("status {status}"),
                    t0.elapsed().as_millis() as u64,
                )
            }
            Err(e) => {
                warn!("Webhook request failed: {e}");
                ChannelResult::failed(self.name(), e.to_string(), t0.elapsed().as_millis() as u64)
            }
        }
    }
}
