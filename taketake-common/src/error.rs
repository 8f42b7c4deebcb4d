use std::path::PathBuf;

use thiserror::Error;

/// The full taxonomy of fatal failures a `taketake` run can surface (spec
/// §7). `listen` is the only step that catches two of these
/// (`NoSuitableAudioSpan`, `TimestampGrokError`) and downgrades them to a
/// partial `AudioInfo`; everything else propagates and aborts the run.
#[derive(Debug, Error)]
pub enum TaketakeError {
    #[error("invalid progress file {path}: {reason}")]
    InvalidProgressFile { path: PathBuf, reason: String },

    #[error("subprocess `{command}` failed (status {status:?}): {stderr}")]
    SubprocessError {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("invalid media file {path}: {reason}")]
    InvalidMediaFile { path: PathBuf, reason: String },

    #[error("no par2 volume covers {path}")]
    MissingPar2File { path: PathBuf },

    #[error("timestamp grammar rejected transcript: {reason}")]
    TimestampGrokError { reason: String },

    #[error("no non-silent span of sufficient duration in {path}")]
    NoSuitableAudioSpan { path: PathBuf },

    #[error("xdelta verification failed: {offending_line}")]
    XdeltaMismatch { offending_line: String },

    #[error("step `{step}` received unexpected token {token} on presync queue `{queue}`")]
    PreSyncTokenError {
        step: String,
        queue: String,
        token: u64,
    },

    #[error("step `{step}` desynchronized: extra tokens per queue: {extra}")]
    DesynchronizationError { step: String, extra: String },

    #[error("step `{step}` received duplicate token {token} on queue `{queue}`")]
    DuplicateTokenError {
        step: String,
        queue: String,
        token: u64,
    },

    #[error("step network wiring error: {0}")]
    NetworkWiring(String),

    #[error("interactive prompt failed: {0}")]
    PromptError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaketakeError>;
