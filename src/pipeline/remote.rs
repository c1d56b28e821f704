//! Remote relay client.
//!
//! Two posting surfaces on the same endpoint: `/events` takes the raw
//! `NotificationEvent` (thin mode), `/notify` takes the legacy rich payload
//! with a single retry. `/health` is an optional pre-flight. A 401 means the
//! bearer token is wrong — that is a configuration error, logged and never
//! retried.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::error::{BellError, Result};
use crate::events::NotificationEvent;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const LEGACY_TIMEOUT: Duration = Duration::from_secs(2);
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const LEGACY_RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct RelayClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl RelayClient {
    /// Returns `None` when no remote URL is configured.
    pub fn from_config(url: &str, token: &str) -> Option<Self> {
        if url.is_empty() {
            return None;
        }
        Some(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token: if token.is_empty() {
                None
            } else {
                Some(token.to_string())
            },
            client: Client::new(),
        })
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Pre-flight availability check.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let request = self.with_auth(self.client.get(&url).timeout(HEALTH_TIMEOUT));
        match request.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!("Relay health check returned {}", resp.status());
                false
            }
            Err(e) => {
                debug!("Relay health check failed: {e}");
                false
            }
        }
    }

    /// Thin mode: forward the raw event. One attempt, no retry.
    pub async fn post_event(&self, event: &NotificationEvent) -> Result<()> {
        let url = format!("{}/events", self.base_url);
        let request = self
            .with_auth(self.client.post(&url).timeout(EVENT_TIMEOUT))
            .json(event);
        Self::check_response(request.send().await?).await
    }

    /// Legacy mode: rich payload, one retry after a short backoff. The retry
    /// never applies to a 401 — a rejected token will not fix itself.
    pub async fn post_notify(&self, payload: &serde_json::Value) -> Result<()> {
        let url = format!("{}/notify", self.base_url);

        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(LEGACY_RETRY_BACKOFF).await;
                debug!("Retrying relay /notify");
            }

            let request = self
                .with_auth(self.client.post(&url).timeout(LEGACY_TIMEOUT))
                .json(payload);
            match request.send().await {
                Ok(resp) => match Self::check_response(resp).await {
                    Ok(()) => return Ok(()),
                    Err(e @ BellError::Relay { status: 401, .. }) => return Err(e),
                    Err(e) => last_err = Some(e),
                },
                Err(e) => last_err = Some(e.into()),
            }
        }
        Err(last_err.unwrap_or(BellError::RelayNotConfigured))
    }

    async fn check_response(resp: reqwest::Response) -> Result<()> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        if status.as_u16() == 401 {
            warn!("Relay rejected the bearer token (401) — check remote.token");
        }
        Err(BellError::Relay {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal relay stub: answers every request with `status_line` and
    /// counts how many requests arrived.
    async fn stub_relay(status_line: &'static str, hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response =
                    format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn empty_url_means_no_client() {
        assert!(RelayClient::from_config("", "tok").is_none());
        assert!(RelayClient::from_config("https://relay.example.com", "").is_some());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let relay = RelayClient::from_config("https://relay.example.com/", "").unwrap();
        assert_eq!(relay.base_url, "https://relay.example.com");
    }

    #[tokio::test]
    async fn unreachable_relay_fails_health_check() {
        let relay = RelayClient::from_config("http://127.0.0.1:1", "").unwrap();
        assert!(!relay.health_check().await);
    }

    #[tokio::test]
    async fn unreachable_relay_fails_post_event() {
        let relay = RelayClient::from_config("http://127.0.0.1:1", "tok").unwrap();
        let event = NotificationEvent {
            transaction_id: "t1".into(),
            session_id: "s1".into(),
            session_name: None,
            project_name: None,
            transcript_path: None,
            duration_ms: 31_000,
            prompt_text: None,
            files_modified: vec![],
            tools_used: vec![],
            stop_payload: serde_json::Value::Null,
            usage: None,
            model: None,
        };
        assert!(relay.post_event(&event).await.is_err());
    }

    #[tokio::test]
    async fn legacy_notify_retries_once_on_server_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = stub_relay("HTTP/1.1 500 Internal Server Error", hits.clone()).await;
        let relay = RelayClient::from_config(&base, "").unwrap();

        let err = relay
            .post_notify(&serde_json::json!({"summary": "done"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BellError::Relay { status: 500, .. }));
        // One original attempt plus exactly one retry.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn legacy_notify_never_retries_a_rejected_token() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = stub_relay("HTTP/1.1 401 Unauthorized", hits.clone()).await;
        let relay = RelayClient::from_config(&base, "bad-token").unwrap();

        let err = relay
            .post_notify(&serde_json::json!({"summary": "done"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BellError::Relay { status: 401, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
