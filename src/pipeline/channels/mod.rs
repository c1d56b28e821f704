//! Delivery channel adapters.
//!
//! Each adapter wraps one external side effect behind the same contract:
//! `dispatch` always returns a `ChannelResult`, never an error — a failing
//! channel degrades to a failed result plus a log line and can never abort
//! its siblings.

pub mod console;
pub mod speech;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::events::NotificationEvent;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelResult {
    pub channel: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ChannelResult {
    pub fn ok(channel: &str, duration_ms: u64) -> Self {
        Self {
            channel: channel.into(),
            success: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(channel: &str, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            channel: channel.into(),
            success: false,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Disabled channels are constructed but never dispatched to; missing
    /// credentials or an invalid URL surface here, not as runtime errors.
    fn enabled(&self) -> bool;

    async fn dispatch(&self, summary: &str, event: &NotificationEvent) -> ChannelResult;
}
