//! The resumable progress substrate: the worklist data model and the
//! per-file sidecar files in a run's progress directory (spec §3).

pub mod model;
pub mod store;
pub mod tagged;

pub use model::{AudioInfo, DataClass, SpeechRange, WorklistEntry};
pub use tagged::{TaggedInstant, TaggedPath};
