//! The speech-recognition library is an external collaborator (spec §1);
//! the core only consumes its wave-file+offset+duration -> string-or-nothing
//! contract. Mirrors the shape of the teacher's `whisperd::Stt` trait, which
//! wraps the same kind of CPU-bound, non-reentrant engine behind an
//! `async_trait` so the pool in `listen` can hold it as `Rc<dyn Recognizer>`.

use std::path::Path;

use async_trait::async_trait;

#[async_trait(?Send)]
pub trait Recognizer {
    /// Return the recognized transcript for the given span of `wav`, or
    /// `None` if the engine found no speech there.
    async fn recognize(&self, wav: &Path, start_s: f64, duration_s: f64) -> Option<String>;
}

/// Used whenever `--skip-speech-to-text` is set, or as a placeholder until
/// a real engine is wired in: every file falls back to its configured
/// `fallback_timestamp` policy instead.
pub struct NullRecognizer;

#[async_trait(?Send)]
impl Recognizer for NullRecognizer {
    async fn recognize(&self, _wav: &Path, _start_s: f64, _duration_s: f64) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_recognizer_finds_nothing() {
        let r = NullRecognizer;
        assert!(r.recognize(Path::new("x.wav"), 0.0, 1.0).await.is_none());
    }
}
