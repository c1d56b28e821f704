//! session-bell: voice and webhook notifications for long-running Claude Code
//! sessions.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use session_bell::config::Config;
use session_bell::events::NotificationEvent;
use session_bell::history;
use session_bell::pipeline::audio_queue::AudioQueue;
use session_bell::pipeline::orchestrator::{NotificationOrchestrator, OrchestrationResult};
use session_bell::pipeline::tracker::{LogTailer, TransactionTracker};

#[derive(Parser, Debug)]
#[command(name = "session-bell", about = "Voice and webhook notifications for long-running coding sessions")]
struct Args {
    /// Path to session-bell.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print channel-enablement JSON and exit
    #[arg(long)]
    status: bool,

    /// Run one synthetic transaction through the orchestrator and exit
    #[arg(long)]
    test: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,reqwest=info,hyper=info")
    } else {
        EnvFilter::new("info,reqwest=warn,hyper=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref());

    let queue = AudioQueue::new(&config.speech.player);
    let orchestrator = NotificationOrchestrator::new(&config, queue.clone());

    if args.status {
        println!("{}", serde_json::to_string_pretty(&orchestrator.channel_status())?);
        return Ok(());
    }

    if args.test {
        let event = synthetic_event();
        let result = orchestrator.orchestrate(&event).await;
        record_history(&event, &result);
        println!("{}", serde_json::to_string_pretty(&result)?);
        queue.wait_for_drain().await;
        return Ok(());
    }

    // Normal invocation: tail the event log and dispatch completed
    // transactions until killed.
    let (tx, mut rx) = mpsc::channel::<NotificationEvent>(32);
    let mut tracker = TransactionTracker::new(config.tracker.threshold_ms);
    tracker.set_notification_sink(tx);

    let log_path = config.event_log_path();
    let mut tailer = LogTailer::new(&log_path);

    info!(
        "session-bell started — tailing {} (threshold {}ms)",
        log_path.display(),
        config.tracker.threshold_ms
    );

    let mut poll = tokio::time::interval(Duration::from_millis(config.tracker.poll_interval_ms));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                tailer.poll(&mut tracker);
            }
            Some(event) = rx.recv() => {
                let result = orchestrator.orchestrate(&event).await;
                record_history(&event, &result);
                info!(
                    "Notification for {}: {} ok, {} failed",
                    event.transaction_id,
                    result.succeeded(),
                    result.failed()
                );
            }
        }
    }
}

fn record_history(event: &NotificationEvent, result: &OrchestrationResult) {
    history::save_record(
        &history::default_dir(),
        &history::HistoryRecord {
            timestamp: history::now_timestamp(),
            transaction_id: event.transaction_id.clone(),
            mode: result.mode.to_string(),
            summary: result.summary.clone(),
            duration_ms: event.duration_ms,
            channels_ok: result.succeeded(),
            channels_failed: result.failed(),
        },
    );
}

/// Synthetic above-threshold transaction for `--test`.
fn synthetic_event() -> NotificationEvent {
    NotificationEvent {
        transaction_id: "txn-test-0".into(),
        session_id: "test-session".into(),
        session_name: Some("session-bell self test".into()),
        project_name: None,
        transcript_path: None,
        duration_ms: 31_000,
        prompt_text: Some("Synthetic test transaction".into()),
        files_modified: vec!["src/main.rs".into()],
        tools_used: vec!["Edit".into(), "Bash".into()],
        stop_payload: serde_json::json!({"reason": "end_turn"}),
        usage: None,
        model: None,
    }
}
