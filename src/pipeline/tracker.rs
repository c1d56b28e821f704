//! Transaction tracker and event log tailer.
//!
//! Correlates the ordered hook event stream into work transactions:
//! `UserPromptSubmit` opens an entry, `PostToolUse` accumulates file/tool
//! data, `Stop` closes it. A completed transaction at or above the duration
//! threshold produces exactly one `NotificationEvent`, deduplicated by
//! prompt id for the lifetime of the process.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{now_ms, HookEvent, HookEventType, NotificationEvent};

/// Stop events older than this at processing time are discarded outright,
/// so delayed or replayed log entries cannot fire hours-late notifications.
pub const STALE_EVENT_WINDOW_MS: i64 = 5 * 60 * 1000;

/// One open transaction, keyed by session id in the tracker map.
#[derive(Debug)]
struct TransactionEntry {
    transaction_id: String,
    prompt_id: String,
    session_name: Option<String>,
    project_name: Option<String>,
    start_time: i64,
    prompt_text: Option<String>,
    files_modified: BTreeSet<String>,
    tools_used: BTreeSet<String>,
}

pub struct TransactionTracker {
    /// At most one live entry per session id.
    entries: HashMap<String, TransactionEntry>,
    /// Prompt ids already notified. Process-lifetime, never persisted.
    notified: HashSet<String>,
    threshold_ms: i64,
    sink: Option<mpsc::Sender<NotificationEvent>>,
}

impl TransactionTracker {
    pub fn new(threshold_ms: i64) -> Self {
        Self {
            entries: HashMap::new(),
            notified: HashSet::new(),
            threshold_ms,
            sink: None,
        }
    }

    /// Register the notification sink. Exactly one sink at a time;
    /// re-registration replaces the previous one.
    pub fn set_notification_sink(&mut self, sink: mpsc::Sender<NotificationEvent>) {
        self.sink = Some(sink);
    }

    /// Clear all transaction state and the dedup set. Test isolation only.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.notified.clear();
    }

    pub fn open_transactions(&self) -> usize {
        self.entries.len()
    }

    pub fn process_event(&mut self, event: &HookEvent) {
        match event.event_type {
            HookEventType::UserPromptSubmit => self.on_prompt_submit(event),
            HookEventType::PostToolUse => self.on_tool_use(event),
            HookEventType::Stop => self.on_stop(event),
            HookEventType::Unknown => debug!("Ignoring unknown event type"),
        }
    }

    fn on_prompt_submit(&mut self, event: &HookEvent) {
        // A second prompt for the same session abandons the prior
        // transaction, discarding its partial accumulation.
        if let Some(old) = self.entries.remove(&event.session_id) {
            debug!(
                "Abandoning open transaction {} for session {}",
                old.transaction_id, event.session_id
            );
        }

        let transaction_id = event
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("txn-{}-{}", event.session_id, event.timestamp));
        let prompt_id = event.prompt_id.clone().unwrap_or_else(|| transaction_id.clone());

        debug!("Opening transaction {transaction_id} for session {}", event.session_id);
        self.entries.insert(
            event.session_id.clone(),
            TransactionEntry {
                transaction_id,
                prompt_id,
                session_name: event.session_name.clone(),
                project_name: event.project_name.clone(),
                start_time: event.timestamp,
                prompt_text: event.prompt_text.clone(),
                files_modified: BTreeSet::new(),
                tools_used: BTreeSet::new(),
            },
        );
    }

    fn on_tool_use(&mut self, event: &HookEvent) {
        // No open transaction for this session: silent no-op. Tool events
        // can arrive duplicated or for sessions we never saw open.
        let Some(entry) = self.entries.get_mut(&event.session_id) else {
            debug!("PostToolUse for session {} with no open transaction", event.session_id);
            return;
        };

        if let Some(tool) = &event.tool_name {
            entry.tools_used.insert(tool.clone());
        }
        if let Some(tools) = &event.tools_used {
            for tool in tools {
                entry.tools_used.insert(tool.clone());
            }
        }
        if let Some(files) = &event.files_modified {
            for file in files {
                entry.files_modified.insert(file.clone());
            }
        }
    }

    fn on_stop(&mut self, event: &HookEvent) {
        // Staleness filter runs before anything else.
        let age_ms = now_ms() - event.timestamp;
        if age_ms > STALE_EVENT_WINDOW_MS {
            warn!(
                "Discarding stale Stop for session {} ({age_ms}ms old)",
                event.session_id
            );
            return;
        }

        let Some(entry) = self.entries.remove(&event.session_id) else {
            debug!("Stop for session {} with no open transaction", event.session_id);
            return;
        };

        let duration_ms = event.timestamp - entry.start_time;
        if duration_ms < self.threshold_ms {
            debug!(
                "Transaction {} below threshold ({duration_ms}ms < {}ms), skipping",
                entry.transaction_id, self.threshold_ms
            );
            return;
        }

        if self.notified.contains(&entry.prompt_id) {
            debug!("Prompt {} already notified, skipping", entry.prompt_id);
            return;
        }
        self.notified.insert(entry.prompt_id.clone());

        // The Stop payload carries per-turn lists that are more complete than
        // our accumulation; prefer them when non-empty.
        let files_modified = match &event.files_modified {
            Some(files) if !files.is_empty() => files.clone(),
            _ => entry.files_modified.into_iter().collect(),
        };
        let tools_used = match &event.tools_used {
            Some(tools) if !tools.is_empty() => tools.clone(),
            _ => entry.tools_used.into_iter().collect(),
        };

        let notification = NotificationEvent {
            transaction_id: entry.transaction_id,
            session_id: event.session_id.clone(),
            session_name: entry.session_name.or_else(|| event.session_name.clone()),
            project_name: entry.project_name.or_else(|| event.project_name.clone()),
            transcript_path: event.transcript_path.clone(),
            duration_ms,
            prompt_text: entry.prompt_text,
            files_modified,
            tools_used,
            stop_payload: event.payload.clone(),
            usage: event.usage.clone(),
            model: event.model.clone(),
        };

        info!(
            "Transaction {} complete after {duration_ms}ms, notifying",
            notification.transaction_id
        );

        // Message-passing handoff: a slow or dead consumer drops the event
        // rather than corrupting tracker state.
        match &self.sink {
            Some(sink) => {
                if let Err(e) = sink.try_send(notification) {
                    warn!("Notification sink unavailable, dropping event: {e}");
                }
            }
            None => warn!("No notification sink registered, dropping event"),
        }
    }
}

/// Tails the hook event log by byte offset and feeds parsed lines to a
/// tracker. The offset advances before processing, so a byte range is
/// visited at most once even if processing fails mid-pass.
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
    in_flight: AtomicBool,
}

impl LogTailer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read and process the unread tail of the log. Returns the number of
    /// events handed to the tracker. A trigger that arrives while a pass is
    /// in flight is dropped, not queued; the next poll picks up the tail.
    pub fn poll(&mut self, tracker: &mut TransactionTracker) -> usize {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Tail pass already in flight, dropping trigger");
            return 0;
        }
        let processed = self.poll_inner(tracker);
        self.in_flight.store(false, Ordering::SeqCst);
        processed
    }

    fn poll_inner(&mut self, tracker: &mut TransactionTracker) -> usize {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return 0, // log not created yet
        };

        if size < self.offset {
            info!("Event log shrank, resetting offset (truncation or rotation)");
            self.offset = 0;
        }
        if size == self.offset {
            return 0;
        }

        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open event log {}: {e}", self.path.display());
                return 0;
            }
        };
        if let Err(e) = file.seek(SeekFrom::Start(self.offset)) {
            warn!("Failed to seek event log: {e}");
            return 0;
        }

        let delta = size - self.offset;
        let mut buf = Vec::with_capacity(delta as usize);
        if let Err(e) = file.take(delta).read_to_end(&mut buf) {
            warn!("Failed to read event log delta: {e}");
            return 0;
        }

        // Advance before processing: each byte range is visited at most once.
        self.offset += buf.len() as u64;

        let chunk = String::from_utf8_lossy(&buf);
        let mut processed = 0;
        for line in chunk.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HookEvent>(line) {
                Ok(event) => {
                    tracker.process_event(&event);
                    processed += 1;
                }
                Err(e) => debug!("Skipping malformed log line: {e}"),
            }
        }
        processed
    }
}
