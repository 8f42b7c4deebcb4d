//! Reads and writes the per-file sidecars in a run's progress directory
//! (spec §3's run layout). Each sidecar is owned by exactly one step task;
//! this module only implements the mechanical (de)serialization.

use std::path::{Path, PathBuf};

use taketake_common::{defaults, TaketakeError};
use tracing::{debug, trace};

use crate::model::AudioInfo;

/// `<dest_dir>/.taketake.<run_id>.tmp`
pub fn run_dir(dest_dir: &Path, run_id: &str) -> PathBuf {
    dest_dir.join(format!(
        "{}{run_id}{}",
        defaults::PROGRESS_DIR_PREFIX,
        defaults::PROGRESS_DIR_SUFFIX
    ))
}

/// `<run_dir>/<wav-basename>`
pub fn wav_progress_dir(run_dir: &Path, wav_basename: &str) -> PathBuf {
    run_dir.join(wav_basename)
}

pub fn audioinfo_path(wav_progress_dir: &Path) -> PathBuf {
    wav_progress_dir.join(defaults::AUDIOINFO_FNAME)
}

pub fn guess_path(wav_progress_dir: &Path) -> PathBuf {
    wav_progress_dir.join(defaults::GUESS_FNAME)
}

pub fn provided_path(wav_progress_dir: &Path) -> PathBuf {
    wav_progress_dir.join(defaults::PROVIDED_FNAME)
}

pub fn xdelta_path(wav_progress_dir: &Path) -> PathBuf {
    wav_progress_dir.join(defaults::XDELTA_FNAME)
}

/// `.interrupted-abandoned.<ts>.flac`, for rolled-back partial encodes.
pub fn interrupted_flac_name(ts: &str) -> String {
    format!(
        "{}{ts}{}",
        defaults::INTERRUPTED_FLAC_PREFIX,
        defaults::INTERRUPTED_FLAC_SUFFIX
    )
}

/// Load `.audioinfo.json` if present, validating its `__dataclass__`
/// discriminant. `listen` uses this to decide whether it can skip
/// recognition on resume (spec §4.2, scenario S7).
pub async fn load_audio_info(
    wav_progress_dir: &Path,
) -> Result<Option<AudioInfo>, TaketakeError> {
    let path = audioinfo_path(wav_progress_dir);
    if !tokio::fs::try_exists(&path).await? {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(&path).await?;
    let info: AudioInfo =
        serde_json::from_str(&text).map_err(|e| TaketakeError::InvalidProgressFile {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    info.check_discriminant(&path)?;
    trace!(?path, "loaded cached audio info");
    Ok(Some(info))
}

pub async fn save_audio_info(
    wav_progress_dir: &Path,
    info: &AudioInfo,
) -> Result<(), TaketakeError> {
    let path = audioinfo_path(wav_progress_dir);
    let text = serde_json::to_string_pretty(info)?;
    tokio::fs::write(&path, text).await?;
    debug!(?path, "saved audio info");
    Ok(())
}

pub async fn load_guess(wav_progress_dir: &Path) -> Result<Option<String>, TaketakeError> {
    read_trimmed(&guess_path(wav_progress_dir)).await
}

pub async fn save_guess(wav_progress_dir: &Path, guess: &str) -> Result<(), TaketakeError> {
    tokio::fs::write(guess_path(wav_progress_dir), guess).await?;
    Ok(())
}

pub async fn load_provided(wav_progress_dir: &Path) -> Result<Option<String>, TaketakeError> {
    read_trimmed(&provided_path(wav_progress_dir)).await
}

pub async fn save_provided(wav_progress_dir: &Path, name: &str) -> Result<(), TaketakeError> {
    tokio::fs::write(provided_path(wav_progress_dir), name).await?;
    Ok(())
}

async fn read_trimmed(path: &Path) -> Result<Option<String>, TaketakeError> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(path).await?;
    Ok(Some(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn audio_info_sidecar_round_trips() {
        let dir = tempdir().unwrap();
        let mut info = AudioInfo::new();
        info.duration_s = Some(12.0);
        save_audio_info(dir.path(), &info).await.unwrap();
        let loaded = load_audio_info(dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded.duration_s, Some(12.0));
    }

    #[tokio::test]
    async fn missing_audio_info_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_audio_info(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn guess_round_trips_trimmed() {
        let dir = tempdir().unwrap();
        save_guess(dir.path(), "piano.20210519-1938-wed.flac\n")
            .await
            .unwrap();
        let loaded = load_guess(dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded, "piano.20210519-1938-wed.flac");
    }
}
