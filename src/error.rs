//! Hard-failure error type for the few paths that cannot degrade in place.
//!
//! Transient channel failures never use this — they are carried as
//! `ChannelResult` values so a broken channel cannot abort the pipeline.

#[derive(Debug, thiserror::Error)]
pub enum BellError {
    #[error("relay not configured: remote.url is empty")]
    RelayNotConfigured,

    #[error("relay error: status={status}, body={body}")]
    Relay { status: u16, body: String },

    #[error("speech synthesis error: status={status}")]
    Synthesis { status: u16 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BellError>;
