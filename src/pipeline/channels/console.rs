//! Console channel: prints the notification to stdout.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::{Channel, ChannelResult};
use crate::events::NotificationEvent;

pub struct ConsoleChannel {
    enabled: bool,
}

impl ConsoleChannel {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn dispatch(&self, summary: &str, event: &NotificationEvent) -> ChannelResult {
        let t0 = Instant::now();
        println!(
            "[session-bell] {} ({:.1}s) — {summary}",
            event.label(),
            event.duration_ms as f64 / 1000.0
        );
        debug!("Console notification for {}", event.transaction_id);
        ChannelResult::ok(self.name(), t0.elapsed().as_millis() as u64)
    }
}
