//! End-to-end pipeline tests: event log → tailer → tracker → orchestrator.

use std::io::Write;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use session_bell::config::Config;
use session_bell::events::{now_ms, NotificationEvent};
use session_bell::pipeline::audio_queue::AudioQueue;
use session_bell::pipeline::orchestrator::NotificationOrchestrator;
use session_bell::pipeline::tracker::{LogTailer, TransactionTracker};

fn append(log: &std::path::Path, line: &serde_json::Value) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .unwrap();
    writeln!(file, "{line}").unwrap();
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.summary.enabled = false;
    config.speech.enabled = false;
    config.webhook.enabled = false;
    config.console.enabled = true;
    config
}

#[tokio::test]
async fn completed_transaction_flows_from_log_to_channels() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("events.jsonl");

    let (tx, mut rx) = mpsc::channel::<NotificationEvent>(8);
    let mut tracker = TransactionTracker::new(30_000);
    tracker.set_notification_sink(tx);
    let mut tailer = LogTailer::new(&log);

    let base = now_ms() - 31_000;
    append(
        &log,
        &serde_json::json!({
            "eventType": "UserPromptSubmit",
            "timestamp": base,
            "sessionId": "s1",
            "promptId": "p1",
            "promptText": "refactor the parser"
        }),
    );
    append(
        &log,
        &serde_json::json!({
            "eventType": "PostToolUse",
            "timestamp": base + 5_000,
            "sessionId": "s1",
            "toolName": "Edit",
            "filesModified": ["src/parser.rs"]
        }),
    );
    assert_eq!(tailer.poll(&mut tracker), 2);
    assert!(rx.try_recv().is_err());

    append(
        &log,
        &serde_json::json!({
            "eventType": "Stop",
            "timestamp": base + 31_000,
            "sessionId": "s1",
            "payload": {"reason": "end_turn"}
        }),
    );
    assert_eq!(tailer.poll(&mut tracker), 1);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.duration_ms, 31_000);
    assert_eq!(event.tools_used, vec!["Edit"]);
    assert_eq!(event.files_modified, vec!["src/parser.rs"]);
    assert_eq!(event.prompt_text.as_deref(), Some("refactor the parser"));

    // Orchestrate the event through the offline pipeline.
    let orchestrator = NotificationOrchestrator::new(&offline_config(), AudioQueue::new("true"));
    let result = orchestrator.orchestrate(&event).await;
    assert_eq!(result.mode, "local");
    assert_eq!(result.succeeded(), 1);
    assert!(result.summary.unwrap().contains("31 seconds"));
}

#[tokio::test]
async fn below_threshold_transaction_is_silent() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("events.jsonl");

    let (tx, mut rx) = mpsc::channel::<NotificationEvent>(8);
    let mut tracker = TransactionTracker::new(30_000);
    tracker.set_notification_sink(tx);
    let mut tailer = LogTailer::new(&log);

    let base = now_ms() - 29_000;
    append(
        &log,
        &serde_json::json!({
            "eventType": "UserPromptSubmit",
            "timestamp": base,
            "sessionId": "s1",
            "promptId": "p1"
        }),
    );
    append(
        &log,
        &serde_json::json!({
            "eventType": "Stop",
            "timestamp": base + 29_000,
            "sessionId": "s1"
        }),
    );
    assert_eq!(tailer.poll(&mut tracker), 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn replayed_log_suffix_does_not_renotify() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("events.jsonl");

    let (tx, mut rx) = mpsc::channel::<NotificationEvent>(8);
    let mut tracker = TransactionTracker::new(30_000);
    tracker.set_notification_sink(tx);
    let mut tailer = LogTailer::new(&log);

    let base = now_ms() - 40_000;
    let lines = [
        serde_json::json!({
            "eventType": "UserPromptSubmit",
            "timestamp": base,
            "sessionId": "s1",
            "promptId": "p1"
        }),
        serde_json::json!({
            "eventType": "Stop",
            "timestamp": base + 35_000,
            "sessionId": "s1"
        }),
    ];
    for line in &lines {
        append(&log, line);
    }
    tailer.poll(&mut tracker);
    assert!(rx.try_recv().is_ok());

    // The log is truncated and rewritten with the same transaction — the
    // tailer re-reads it, but the dedup set suppresses a second notification.
    std::fs::write(&log, "").unwrap();
    assert_eq!(tailer.poll(&mut tracker), 0); // observes the shrink, offset resets
    for line in &lines {
        append(&log, line);
    }
    assert_eq!(tailer.poll(&mut tracker), 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn speech_clips_drain_through_the_audio_queue() {
    let tmp = TempDir::new().unwrap();
    let queue = AudioQueue::new("true");

    let clip = tmp.path().join("clip.wav");
    std::fs::write(&clip, b"audio").unwrap();

    assert!(queue.enqueue(&clip, 0));
    tokio::time::timeout(Duration::from_secs(5), queue.wait_for_drain())
        .await
        .expect("queue drained");
    assert_eq!(queue.pending(), 0);
}
