use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use taketake_common::TaketakeError;

use crate::tagged::TaggedInstant;

/// Discriminant literal written by every dataclass-shaped sidecar record,
/// checked on load so a sidecar that fails schema discrimination raises
/// [`TaketakeError::InvalidProgressFile`] instead of silently misparsing.
pub trait DataClass: Sized {
    const NAME: &'static str;
}

fn check_discriminant<T: DataClass>(tag: &str, path: &PathBuf) -> Result<(), TaketakeError> {
    if tag == T::NAME {
        Ok(())
    } else {
        Err(TaketakeError::InvalidProgressFile {
            path: path.clone(),
            reason: format!("expected __dataclass__ `{}`, found `{tag}`", T::NAME),
        })
    }
}

/// The non-silent span chosen by `taketake-span`, widened by attack/release.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechRange {
    #[serde(rename = "__dataclass__")]
    pub dataclass: String,
    pub start_s: f64,
    pub duration_s: f64,
}

impl DataClass for SpeechRange {
    const NAME: &'static str = "SpeechRange";
}

impl SpeechRange {
    pub fn new(start_s: f64, duration_s: f64) -> Self {
        Self {
            dataclass: Self::NAME.to_string(),
            start_s,
            duration_s,
        }
    }
}

/// Everything `listen` learns about a source WAV: duration, the chosen
/// speech span, the raw recognizer transcript, and the grammar's parse of
/// it. Every field is independently optional (spec §3 invariant 2):
/// recognition or grammar failure downgrades to a partial record instead of
/// aborting the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioInfo {
    #[serde(rename = "__dataclass__")]
    pub dataclass: String,
    pub duration_s: Option<f64>,
    pub speech_range: Option<SpeechRange>,
    pub recognized_speech: Option<String>,
    pub parsed_timestamp: Option<TaggedInstant>,
    #[serde(default)]
    pub extra_speech: Vec<String>,
}

impl DataClass for AudioInfo {
    const NAME: &'static str = "AudioInfo";
}

impl AudioInfo {
    pub fn new() -> Self {
        Self {
            dataclass: Self::NAME.to_string(),
            ..Default::default()
        }
    }

    /// Validate the `__dataclass__` discriminant of a record just loaded
    /// from `path`, as required by spec §7's `InvalidProgressFile`.
    pub fn check_discriminant(&self, path: &PathBuf) -> Result<(), TaketakeError> {
        check_discriminant::<Self>(&self.dataclass, path)
    }
}

/// One worklist entry: the mutable per-file record threaded through the
/// step network by token, never destroyed during a run (spec §3).
#[derive(Debug, Clone)]
pub struct WorklistEntry {
    pub source_wav: PathBuf,
    pub dest_dir: PathBuf,
    pub wav_progress_dir: PathBuf,
    pub source_link: PathBuf,

    pub audio_info: AudioInfo,

    pub fname_guess: Option<String>,
    pub fname_prompted: Option<String>,
    pub timestamp: Option<chrono::DateTime<chrono::Local>>,
    pub flac_path: Option<PathBuf>,
    pub par_paths: Vec<PathBuf>,
}

impl WorklistEntry {
    pub fn new(source_wav: PathBuf, dest_dir: PathBuf, wav_progress_dir: PathBuf) -> Self {
        let source_link = wav_progress_dir.join(taketake_common::defaults::SOURCE_WAV_LINKNAME);
        Self {
            source_wav,
            dest_dir,
            wav_progress_dir,
            source_link,
            audio_info: AudioInfo::new(),
            fname_guess: None,
            fname_prompted: None,
            timestamp: None,
            flac_path: None,
            par_paths: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_info_round_trips_through_json() {
        let mut info = AudioInfo::new();
        info.duration_s = Some(42.5);
        info.speech_range = Some(SpeechRange::new(1.0, 3.0));
        info.extra_speech = vec!["test".into(), "tone".into()];
        let json = serde_json::to_string(&info).unwrap();
        let back: AudioInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.duration_s, info.duration_s);
        assert_eq!(back.extra_speech, info.extra_speech);
        back.check_discriminant(&PathBuf::from("x")).unwrap();
    }

    #[test]
    fn wrong_discriminant_is_invalid_progress_file() {
        let json = r#"{"__dataclass__":"NotAudioInfo","duration_s":null,"speech_range":null,"recognized_speech":null,"parsed_timestamp":null,"extra_speech":[]}"#;
        let info: AudioInfo = serde_json::from_str(json).unwrap();
        let err = info
            .check_discriminant(&PathBuf::from("bad.json"))
            .unwrap_err();
        assert!(matches!(err, TaketakeError::InvalidProgressFile { .. }));
    }
}
