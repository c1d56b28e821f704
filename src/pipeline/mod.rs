//! Notification pipeline: transaction tracking and multi-channel dispatch.
//!
//! Components:
//! - `tracker`: correlates hook events into work transactions, tails the log
//! - `orchestrator`: resolves the operating mode and fans out to channels
//! - `summarizer`: Ollama summary generation with a deterministic fallback
//! - `channels`: speech, chat-webhook, and console delivery adapters
//! - `audio_queue`: serialized playback of synthesized clips
//! - `remote`: relay client for the thin and legacy remote modes

pub mod audio_queue;
pub mod channels;
pub mod orchestrator;
pub mod remote;
pub mod summarizer;
pub mod tracker;
