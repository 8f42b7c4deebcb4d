//! The nine step tasks of the `taketake` pipeline (spec §4.2), plus the
//! shared run context and network wiring that compose them.

pub mod autoname;
pub mod cleanup;
pub mod context;
pub mod flacenc;
pub mod listen;
pub mod network;
pub mod pargen;
pub mod prompt;
pub mod recognizer;
pub mod reorder;
pub mod setup;
pub mod xdelta;

pub use context::{FallbackTimestamp, RunContext, TaskConfig};
pub use recognizer::{NullRecognizer, Recognizer};
