//! Summary generation for notifications.
//!
//! Asks Ollama for a short spoken-style sentence describing the finished
//! transaction. Any failure — disabled, timeout, non-2xx, empty or
//! unparseable response — makes the caller fall back to the deterministic
//! heuristic below, so summary generation can never block dispatch.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::events::NotificationEvent;

const SUMMARIZE_PROMPT: &str = r#"Summarize this finished coding task in 1-2 short sentences suitable for text-to-speech. Be concise and conversational. Output ONLY the summary, nothing else.

Task: {prompt}
Tools used: {tools}
Files modified: {files}
Result: {response}

Summary:"#;

const MAX_RESPONSE_CHARS: usize = 2000;
const SUMMARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Spoken-style summary text plus structured outcomes.
#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub outcomes: Vec<String>,
}

pub struct OllamaSummarizer {
    enabled: bool,
    model: String,
    host: String,
    client: Client,
}

impl OllamaSummarizer {
    pub fn new(enabled: bool, model: &str, host: &str) -> Self {
        let client = Client::builder()
            .timeout(SUMMARY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            enabled,
            model: model.to_string(),
            host: host.to_string(),
            client,
        }
    }

    /// Generate a summary, or `None` on any failure.
    pub async fn summarize(
        &self,
        event: &NotificationEvent,
        assistant_text: Option<&str>,
    ) -> Option<Summary> {
        if !self.enabled {
            return None;
        }

        let t_start = Instant::now();
        let response_text: String = assistant_text
            .unwrap_or("")
            .chars()
            .take(MAX_RESPONSE_CHARS)
            .collect();

        let prompt = SUMMARIZE_PROMPT
            .replace("{prompt}", event.prompt_text.as_deref().unwrap_or("(unknown)"))
            .replace("{tools}", &event.tools_used.join(", "))
            .replace("{files}", &event.files_modified.join(", "))
            .replace("{response}", &response_text);

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.3,
                "num_predict": 200
            }
        });

        let url = format!("{}/api/generate", self.host);
        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Summarizer request failed: {e}");
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!("Summarizer returned status {}", resp.status());
            return None;
        }

        let data: serde_json::Value = match resp.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!("Failed to parse summarizer response: {e}");
                return None;
            }
        };

        let text = data["response"].as_str().unwrap_or("").trim().to_string();
        if text.is_empty() {
            warn!("Summarizer returned empty response");
            return None;
        }

        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;
        info!("Summarized transaction {} ({latency_ms:.0}ms)", event.transaction_id);

        Some(Summary {
            text,
            outcomes: event.files_modified.clone(),
        })
    }
}

/// Deterministic local summary built from the transaction's file count and
/// duration. No I/O, cannot fail.
pub fn heuristic_summary(event: &NotificationEvent) -> Summary {
    let duration = format_duration(event.duration_ms);
    let files = event.files_modified.len();

    let text = match files {
        0 => format!("Coding task for {} finished after {duration}.", event.label()),
        1 => format!(
            "Coding task for {} finished after {duration}, modifying one file.",
            event.label()
        ),
        n => format!(
            "Coding task for {} finished after {duration}, modifying {n} files.",
            event.label()
        ),
    };

    Summary {
        text,
        outcomes: event.files_modified.clone(),
    }
}

fn format_duration(ms: i64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        plural(secs, "second")
    } else if secs < 3600 {
        match secs % 60 {
            0 => plural(secs / 60, "minute"),
            rem => format!("{} {}", plural(secs / 60, "minute"), plural(rem, "second")),
        }
    } else {
        match (secs % 3600) / 60 {
            0 => plural(secs / 3600, "hour"),
            rem => format!("{} {}", plural(secs / 3600, "hour"), plural(rem, "minute")),
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
