//! Configuration management for session-bell.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or unparseable file degrades to a working (if
//! mostly silent) pipeline rather than an error.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum transaction duration (ms) worth a notification.
    pub threshold_ms: i64,
    /// Event log poll interval (ms).
    pub poll_interval_ms: u64,
    /// Path to the JSONL event log appended by the hook process.
    /// Empty means `~/.session-bell/events.jsonl`.
    pub event_log: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            threshold_ms: 30_000,
            poll_interval_ms: 1_000,
            event_log: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,
    pub model: String,
    pub host: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "llama3.2:3b".into(),
            host: "http://localhost:11434".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Synthesis provider API key. Empty disables the channel.
    pub api_key: String,
    pub endpoint: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// OS audio player binary invoked with the clip path as its only argument.
    pub player: String,
    /// Static sound played when synthesis fails. Empty means no fallback.
    pub fallback_sound: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            endpoint: "https://api.elevenlabs.io/v1/text-to-speech".into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
            model_id: "eleven_turbo_v2".into(),
            stability: 0.5,
            similarity_boost: 0.75,
            player: "afplay".into(),
            fallback_sound: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    /// Per-project chat webhook URL; validated against a fixed pattern
    /// before any network call is attempted.
    pub url: String,
    pub username: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            username: "session-bell".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Operating mode: "local", "remote-thin", or "remote-legacy".
    pub mode: String,
    pub url: String,
    /// Bearer token sent as `Authorization: Bearer <token>` when non-empty.
    pub token: String,
    /// Pre-flight GET /health before posting.
    pub health_check: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            mode: "local".into(),
            url: String::new(),
            token: String::new(),
            health_check: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub summary: SummaryConfig,
    pub speech: SpeechConfig,
    pub webhook: WebhookConfig,
    pub console: ConsoleConfig,
    pub remote: RemoteConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./session-bell.yaml
    /// 2. ~/.config/session-bell/config.yaml
    /// 3. /etc/session-bell/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("session-bell.yaml")),
                dirs::home_dir().map(|h| h.join(".config/session-bell/config.yaml")),
                Some(PathBuf::from("/etc/session-bell/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    /// Resolved event log path, defaulting under the home directory.
    pub fn event_log_path(&self) -> PathBuf {
        if self.tracker.event_log.is_empty() {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".session-bell/events.jsonl")
        } else {
            PathBuf::from(&self.tracker.event_log)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.tracker.threshold_ms, 30_000);
        assert_eq!(config.remote.mode, "local");
        assert!(config.console.enabled);
        assert!(!config.speech.enabled);
        assert!(config.webhook.url.is_empty());
    }

    #[test]
    fn parses_partial_yaml() {
        let yaml = r#"
tracker:
  threshold_ms: 45000
remote:
  mode: remote-thin
  url: https://relay.example.com
  token: secret
webhook:
  enabled: true
  url: https://discord.com/api/webhooks/123/abc
"#;
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.tracker.threshold_ms, 45_000);
        assert_eq!(config.remote.mode, "remote-thin");
        assert_eq!(config.remote.token, "secret");
        assert!(config.webhook.enabled);
        // Untouched sections keep defaults
        assert_eq!(config.tracker.poll_interval_ms, 1_000);
        assert!(config.console.enabled);
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tracker: [not, a, mapping").unwrap();
        let config = Config::load(Some(file.path()));
        assert_eq!(config.tracker.threshold_ms, 30_000);
    }

    #[test]
    fn explicit_event_log_is_used_verbatim() {
        let mut config = Config::default();
        config.tracker.event_log = "/tmp/events.jsonl".into();
        assert_eq!(config.event_log_path(), PathBuf::from("/tmp/events.jsonl"));
    }
}
