//! session-bell: voice and webhook notifications for long-running Claude Code
//! sessions.
//!
//! An external hook process appends lifecycle events (`UserPromptSubmit`,
//! `PostToolUse`, `Stop`) to a JSONL log. The tracker correlates those events
//! into work transactions and, when one finishes above the configured
//! duration threshold, hands a `NotificationEvent` to the orchestrator, which
//! fans it out to the enabled delivery channels (speech, chat webhook,
//! console) or relays it to a remote endpoint.

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod pipeline;
pub mod transcript;
