//! Notification orchestrator.
//!
//! Resolves the operating mode once per invocation and runs the matching
//! policy:
//! - `Local`: summarize (heuristic on failure), fan out to every enabled
//!   channel, aggregate all results.
//! - `RemoteThin`: forward the raw event to the relay; on failure return a
//!   single failed result and touch no local channel — a misconfigured
//!   remote must not silently leak notifications through local channels.
//! - `RemoteLegacy`: rich payload with retry; failure falls back to the
//!   full local pipeline. Deprecated, retained for older deployments.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::NotificationEvent;
use crate::pipeline::audio_queue::AudioQueue;
use crate::pipeline::channels::console::ConsoleChannel;
use crate::pipeline::channels::speech::SpeechChannel;
use crate::pipeline::channels::webhook::WebhookChannel;
use crate::pipeline::channels::{Channel, ChannelResult};
use crate::pipeline::remote::RelayClient;
use crate::pipeline::summarizer::{heuristic_summary, OllamaSummarizer, Summary};
use crate::transcript;

const TRANSCRIPT_SUMMARY_CHARS: usize = 2000;
const THIN_CHANNEL: &str = "thin-client";
const LEGACY_CHANNEL: &str = "remote-legacy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    RemoteThin,
    RemoteLegacy,
}

impl Mode {
    pub fn from_config(mode: &str) -> Self {
        match mode {
            "remote-thin" => Self::RemoteThin,
            "remote-legacy" => Self::RemoteLegacy,
            _ => Self::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::RemoteThin => "remote-thin",
            Self::RemoteLegacy => "remote-legacy",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrchestrationResult {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub channels: Vec<ChannelResult>,
}

impl OrchestrationResult {
    pub fn succeeded(&self) -> usize {
        self.channels.iter().filter(|c| c.success).count()
    }

    pub fn failed(&self) -> usize {
        self.channels.len() - self.succeeded()
    }
}

pub struct NotificationOrchestrator {
    mode: String,
    summarizer: OllamaSummarizer,
    /// Asynchronous channels, dispatched concurrently.
    channels: Vec<Arc<dyn Channel>>,
    /// Console is dispatched synchronously, after the async fan-out starts.
    console: ConsoleChannel,
    relay: Option<RelayClient>,
    health_check: bool,
}

impl NotificationOrchestrator {
    pub fn new(config: &Config, queue: AudioQueue) -> Self {
        let speech = Arc::new(SpeechChannel::new(&config.speech, queue));
        let webhook = Arc::new(WebhookChannel::new(&config.webhook));
        let channels: Vec<Arc<dyn Channel>> = vec![speech, webhook];

        Self {
            mode: config.remote.mode.clone(),
            summarizer: OllamaSummarizer::new(
                config.summary.enabled,
                &config.summary.model,
                &config.summary.host,
            ),
            channels,
            console: ConsoleChannel::new(config.console.enabled),
            relay: RelayClient::from_config(&config.remote.url, &config.remote.token),
            health_check: config.remote.health_check,
        }
    }

    /// Channel-enablement report for `--status`.
    pub fn channel_status(&self) -> serde_json::Value {
        let mut channels = serde_json::Map::new();
        for channel in &self.channels {
            channels.insert(channel.name().into(), channel.enabled().into());
        }
        channels.insert(self.console.name().into(), self.console.enabled().into());
        json!({
            "mode": Mode::from_config(&self.mode).as_str(),
            "remote_configured": self.relay.is_some(),
            "channels": channels,
        })
    }

    pub async fn orchestrate(&self, event: &NotificationEvent) -> OrchestrationResult {
        let mode = Mode::from_config(&self.mode);
        info!(
            "Orchestrating {} in {} mode",
            event.transaction_id,
            mode.as_str()
        );

        match mode {
            Mode::Local => self.run_local(event).await,
            Mode::RemoteThin => self.run_thin(event).await,
            Mode::RemoteLegacy => self.run_legacy(event).await,
        }
    }

    async fn run_local(&self, event: &NotificationEvent) -> OrchestrationResult {
        let summary = self.generate_summary(event).await;
        let channels = self.dispatch_local(event, &summary).await;
        OrchestrationResult {
            mode: Mode::Local.as_str(),
            summary: Some(summary.text),
            channels,
        }
    }

    async fn run_thin(&self, event: &NotificationEvent) -> OrchestrationResult {
        let t0 = Instant::now();

        let result = match &self.relay {
            None => ChannelResult::failed(THIN_CHANNEL, "remote.url not configured", 0),
            Some(relay) => {
                if self.health_check && !relay.health_check().await {
                    ChannelResult::failed(
                        THIN_CHANNEL,
                        "relay health check failed",
                        t0.elapsed().as_millis() as u64,
                    )
                } else {
                    match relay.post_event(event).await {
                        Ok(()) => ChannelResult::ok(THIN_CHANNEL, t0.elapsed().as_millis() as u64),
                        Err(e) => {
                            // Clean failure, no local fallback.
                            warn!("Thin relay failed, dropping notification: {e}");
                            ChannelResult::failed(
                                THIN_CHANNEL,
                                e.to_string(),
                                t0.elapsed().as_millis() as u64,
                            )
                        }
                    }
                }
            }
        };

        OrchestrationResult {
            mode: Mode::RemoteThin.as_str(),
            summary: None,
            channels: vec![result],
        }
    }

    async fn run_legacy(&self, event: &NotificationEvent) -> OrchestrationResult {
        let t0 = Instant::now();
        let summary = self.generate_summary(event).await;

        // The legacy payload ships the full assistant response, untruncated.
        let response_text = event
            .transcript_path
            .as_deref()
            .and_then(|p| transcript::extract_full_assistant_text(std::path::Path::new(p)));

        let payload = json!({
            "event": event,
            "summary": summary.text,
            "outcomes": summary.outcomes,
            "response": response_text,
        });

        let relay_result = match &self.relay {
            None => Err(crate::error::BellError::RelayNotConfigured),
            Some(relay) => relay.post_notify(&payload).await,
        };

        match relay_result {
            Ok(()) => OrchestrationResult {
                mode: Mode::RemoteLegacy.as_str(),
                summary: Some(summary.text),
                channels: vec![ChannelResult::ok(
                    LEGACY_CHANNEL,
                    t0.elapsed().as_millis() as u64,
                )],
            },
            Err(e) => {
                // Older, permissive policy: fall back to full local dispatch.
                warn!("Legacy relay failed, falling back to local dispatch: {e}");
                let mut channels = vec![ChannelResult::failed(
                    LEGACY_CHANNEL,
                    e.to_string(),
                    t0.elapsed().as_millis() as u64,
                )];
                channels.extend(self.dispatch_local(event, &summary).await);
                OrchestrationResult {
                    mode: Mode::RemoteLegacy.as_str(),
                    summary: Some(summary.text),
                    channels,
                }
            }
        }
    }

    async fn generate_summary(&self, event: &NotificationEvent) -> Summary {
        let assistant_text = event.transcript_path.as_deref().and_then(|p| {
            transcript::extract_last_assistant_text(
                std::path::Path::new(p),
                TRANSCRIPT_SUMMARY_CHARS,
            )
        });

        match self.summarizer.summarize(event, assistant_text.as_deref()).await {
            Some(summary) => summary,
            None => {
                debug!("Summarizer unavailable, using heuristic summary");
                heuristic_summary(event)
            }
        }
    }

    /// Fan out to every enabled channel. Async adapters run concurrently and
    /// are awaited together; console runs inline. No failure aborts the rest.
    async fn dispatch_local(
        &self,
        event: &NotificationEvent,
        summary: &Summary,
    ) -> Vec<ChannelResult> {
        let mut handles = Vec::new();
        for channel in &self.channels {
            if !channel.enabled() {
                debug!("Channel {} disabled, skipping", channel.name());
                continue;
            }
            let channel = Arc::clone(channel);
            let event = event.clone();
            let text = summary.text.clone();
            handles.push(tokio::spawn(async move {
                channel.dispatch(&text, &event).await
            }));
        }

        let mut results = Vec::new();
        if self.console.enabled() {
            results.push(self.console.dispatch(&summary.text, event).await);
        }

        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Channel task panicked: {e}");
                    results.push(ChannelResult::failed("unknown", format!("task failed: {e}"), 0));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event() -> NotificationEvent {
        NotificationEvent {
            transaction_id: "txn-s1-0".into(),
            session_id: "s1".into(),
            session_name: None,
            project_name: Some("bell".into()),
            transcript_path: None,
            duration_ms: 31_000,
            prompt_text: Some("do the thing".into()),
            files_modified: vec!["src/a.rs".into()],
            tools_used: vec!["Edit".into()],
            stop_payload: serde_json::Value::Null,
            usage: None,
            model: None,
        }
    }

    fn base_config() -> Config {
        let mut config = Config::default();
        // Keep tests off the network and off the speakers.
        config.summary.enabled = false;
        config.speech.enabled = false;
        config.webhook.enabled = false;
        config.console.enabled = true;
        config
    }

    fn orchestrator(config: &Config) -> NotificationOrchestrator {
        NotificationOrchestrator::new(config, AudioQueue::new("true"))
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(Mode::from_config("local"), Mode::Local);
        assert_eq!(Mode::from_config("remote-thin"), Mode::RemoteThin);
        assert_eq!(Mode::from_config("remote-legacy"), Mode::RemoteLegacy);
        assert_eq!(Mode::from_config("anything-else"), Mode::Local);
    }

    #[tokio::test]
    async fn local_mode_uses_heuristic_when_summarizer_disabled() {
        let result = orchestrator(&base_config()).orchestrate(&make_event()).await;
        assert_eq!(result.mode, "local");
        let summary = result.summary.clone().unwrap();
        assert!(summary.contains("31 seconds"));
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.channels[0].channel, "console");
    }

    #[tokio::test]
    async fn thin_mode_failure_has_no_local_fallback() {
        let mut config = base_config();
        config.remote.mode = "remote-thin".into();
        config.remote.url = "http://127.0.0.1:1".into();
        config.remote.health_check = false;

        let result = orchestrator(&config).orchestrate(&make_event()).await;
        assert_eq!(result.mode, "remote-thin");
        // Exactly one entry, and it is not the console even though the
        // console channel is enabled.
        assert_eq!(result.channels.len(), 1);
        assert_eq!(result.channels[0].channel, "thin-client");
        assert!(!result.channels[0].success);
    }

    #[tokio::test]
    async fn thin_mode_without_relay_is_a_single_failure() {
        let mut config = base_config();
        config.remote.mode = "remote-thin".into();

        let result = orchestrator(&config).orchestrate(&make_event()).await;
        assert_eq!(result.channels.len(), 1);
        assert!(!result.channels[0].success);
    }

    #[tokio::test]
    async fn legacy_mode_falls_back_to_local_dispatch() {
        let mut config = base_config();
        config.remote.mode = "remote-legacy".into();
        config.remote.url = "http://127.0.0.1:1".into();

        let result = orchestrator(&config).orchestrate(&make_event()).await;
        assert_eq!(result.mode, "remote-legacy");
        // Failed relay entry plus the console fallback.
        assert_eq!(result.channels.len(), 2);
        assert!(!result.channels[0].success);
        assert_eq!(result.channels[0].channel, "remote-legacy");
        assert!(result.channels.iter().any(|c| c.channel == "console" && c.success));
    }

    #[tokio::test]
    async fn channel_status_reports_enablement() {
        let status = orchestrator(&base_config()).channel_status();
        assert_eq!(status["mode"], "local");
        assert_eq!(status["channels"]["console"], true);
        assert_eq!(status["channels"]["speech"], false);
        assert_eq!(status["channels"]["webhook"], false);
        assert_eq!(status["remote_configured"], false);
    }
}
