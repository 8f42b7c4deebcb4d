//! Shared constants, CLI plumbing, and the crate-wide error type for the
//! `taketake` family of crates. Plays the same role `daemon-common` plays
//! for the `whisperd`/`heard`/`seen` binaries: every binary and library in
//! the tree depends on this one for logging setup and the vocabulary of
//! failures it can report.

pub mod cache_flush;
pub mod defaults;
pub mod error;
pub mod log_level;

pub use cache_flush::{CacheFlush, NoopCacheFlush};
pub use error::{Result, TaketakeError};
pub use log_level::LogLevel;

/// Install a `tracing_subscriber::fmt` subscriber at the given level.
///
/// `debug` additionally widens the filter so library `trace!` spans used for
/// "reprint the full call site" diagnostics are visible.
pub fn init_tracing(level: LogLevel, debug: bool) {
    let filter = if debug {
        tracing_subscriber::filter::LevelFilter::TRACE
    } else {
        level.into()
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(debug)
        .init();
}

/// Render a top-level error the way the CLI reports it: a single line
/// unless `--debug` was passed, in which case the full source chain is
/// printed.
pub fn report_error(err: &anyhow::Error, debug: bool) -> String {
    if debug {
        format!("Error - aborting: {err:?}")
    } else {
        format!("Error - aborting: {err}")
    }
}
