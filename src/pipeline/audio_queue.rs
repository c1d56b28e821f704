//! Serialized playback of synthesized audio clips.
//!
//! Multiple notifications finishing in quick succession must never overlap
//! audibly: clips are played one at a time, in submission order, with
//! priority items sorting ahead. Exactly one playback is in flight at any
//! moment; the processing loop self-terminates when the queue drains and
//! restarts on the next enqueue.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Played files are removed on a delay, tolerating slow player startup.
const DELETE_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct QueueItem {
    audio_path: PathBuf,
    enqueued_at: Instant,
    priority: i32,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    /// Single-playback guard — the only concurrency primitive in the pipeline.
    playing: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    player: String,
}

/// Cheaply cloneable handle to the process-wide playback queue. Single
/// instance per process by injection, not hidden statics.
#[derive(Clone)]
pub struct AudioQueue {
    inner: Arc<Inner>,
}

impl AudioQueue {
    /// `player` is the OS audio player binary, invoked with the clip path as
    /// its only argument.
    pub fn new(player: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    playing: false,
                }),
                player: player.to_string(),
            }),
        }
    }

    /// Queue a clip for playback. Returns false if the file does not exist
    /// at enqueue time. Starts the processing loop if idle.
    pub fn enqueue(&self, path: &Path, priority: i32) -> bool {
        if !path.exists() {
            warn!("Refusing to enqueue missing audio file {}", path.display());
            return false;
        }

        let item = QueueItem {
            audio_path: path.to_path_buf(),
            enqueued_at: Instant::now(),
            priority,
        };

        let start_loop = {
            let mut state = self.inner.state.lock().unwrap();
            // FIFO within a priority level, higher priorities ahead.
            let idx = state
                .items
                .iter()
                .position(|i| i.priority < priority)
                .unwrap_or(state.items.len());
            state.items.insert(idx, item);

            if state.playing {
                false
            } else {
                state.playing = true;
                true
            }
        };

        if start_loop {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                inner.process_loop().await;
            });
        }
        true
    }

    /// Poll until the queue is empty and no playback is in flight.
    pub async fn wait_for_drain(&self) {
        loop {
            {
                let state = self.inner.state.lock().unwrap();
                if state.items.is_empty() && !state.playing {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().unwrap().items.len()
    }
}

impl Inner {
    async fn process_loop(self: Arc<Self>) {
        loop {
            let item = {
                let mut state = self.state.lock().unwrap();
                match state.items.pop_front() {
                    Some(item) => item,
                    None => {
                        state.playing = false;
                        break;
                    }
                }
            };

            let waited_ms = item.enqueued_at.elapsed().as_millis();
            debug!(
                "Playing {} (queued for {waited_ms}ms)",
                item.audio_path.display()
            );

            // Failure to play — including a player that could not start —
            // never stalls the queue; move straight on to the next item.
            if let Err(e) = self.play(&item.audio_path).await {
                warn!("Playback failed for {}: {e}", item.audio_path.display());
            }

            schedule_delete(item.audio_path);
        }
    }

    async fn play(&self, path: &Path) -> Result<(), String> {
        let status = tokio::process::Command::new(&self.player)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| format!("player {} could not start: {e}", self.player))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("player exited with {status}"))
        }
    }
}

/// Deferred deletion: the file stays around briefly after playback so a
/// slow-starting player never loses its input.
fn schedule_delete(path: PathBuf) {
    tokio::spawn(async move {
        tokio::time::sleep(DELETE_DELAY).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!("Deferred delete of {} failed: {e}", path.display());
        }
    });
}
