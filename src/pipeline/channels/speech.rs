//! Speech channel: synthesize the summary and queue it for playback.
//!
//! POSTs `{text, voice_id, model_id, voice_settings}` to the synthesis
//! provider, writes the returned audio to a temp file, and hands it to the
//! audio queue. Synthesis failures fall back to a configured static sound so
//! the developer still hears *something*, but the dispatch is reported as
//! failed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::{Channel, ChannelResult};
use crate::config::SpeechConfig;
use crate::error::{BellError, Result};
use crate::events::NotificationEvent;
use crate::pipeline::audio_queue::AudioQueue;

const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SpeechChannel {
    config: SpeechConfig,
    enabled: bool,
    client: Client,
    queue: AudioQueue,
}

impl SpeechChannel {
    pub fn new(config: &SpeechConfig, queue: AudioQueue) -> Self {
        let enabled = config.enabled && !config.api_key.is_empty();
        if config.enabled && config.api_key.is_empty() {
            warn!("Speech channel enabled but api_key is empty, channel disabled");
        }

        let client = Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config: config.clone(),
            enabled,
            client,
            queue,
        }
    }

    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let url = format!("{}/{}", self.config.endpoint, self.config.voice_id);
        let body = json!({
            "text": text,
            "voice_id": self.config.voice_id,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
            }
        });

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BellError::Synthesis {
                status: resp.status().as_u16(),
            });
        }

        let audio = resp.bytes().await?;
        let mut file = tempfile::Builder::new()
            .prefix("session-bell-")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(&audio)?;

        // Ownership passes to the audio queue, which deletes after playback.
        let (_, path) = file.keep().map_err(|e| BellError::Io(e.error))?;
        debug!("Synthesized {} bytes to {}", audio.len(), path.display());
        Ok(path)
    }

    fn enqueue_fallback(&self) -> bool {
        if self.config.fallback_sound.is_empty() {
            return false;
        }
        self.queue.enqueue(Path::new(&self.config.fallback_sound), 0)
    }
}

#[async_trait]
impl Channel for SpeechChannel {
    fn name(&self) -> &'static str {
        "speech"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn dispatch(&self, summary: &str, event: &NotificationEvent) -> ChannelResult {
        let t0 = Instant::now();

        match self.synthesize(summary).await {
            Ok(path) => {
                if self.queue.enqueue(&path, 0) {
                    debug!("Speech queued for {}", event.transaction_id);
                    ChannelResult::ok(self.name(), t0.elapsed().as_millis() as u64)
                } else {
                    ChannelResult::failed(
                        self.name(),
                        "synthesized clip rejected by audio queue",
                        t0.elapsed().as_millis() as u64,
                    )
                }
            }
            Err(e) => {
                warn!("Speech synthesis failed: {e}");
                if self.enqueue_fallback() {
                    debug!("Queued fallback sound instead");
                }
                ChannelResult::failed(self.name(), e.to_string(), t0.elapsed().as_millis() as u64)
            }
        }
    }
}
