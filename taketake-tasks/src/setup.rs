//! `setup`: enumerates validated source WAVs, creates the run directory and
//! each file's progress subdirectory plus `.source.wav` symlink, appends to
//! the worklist, and emits one token per file (spec §4.2). A task
//! coroutine: it has no `pull_from`, so it cannot be driven by `walk`.

use std::path::{Path, PathBuf};

use taketake_common::defaults::WAV_EXTENSIONS;
use taketake_common::TaketakeError;
use taketake_progress::store::wav_progress_dir;
use taketake_progress::WorklistEntry;
use taketake_stepnet::{StepperHandle, Token};
use tracing::{debug, info};

use crate::context::RunContext;

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WAV_EXTENSIONS.iter().any(|w| w.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub async fn run(
    handle: &mut StepperHandle,
    ctx: &RunContext,
    dest_dir: &Path,
    run_dir: &Path,
    sources: &[PathBuf],
) -> Result<(), TaketakeError> {
    tokio::fs::create_dir_all(run_dir).await?;

    for source_wav in sources {
        if !is_wav(source_wav) {
            return Err(TaketakeError::InvalidMediaFile {
                path: source_wav.clone(),
                reason: "not a .wav file".to_string(),
            });
        }
        let basename = source_wav
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input.wav")
            .to_string();
        let entry_dir = wav_progress_dir(run_dir, &basename);
        tokio::fs::create_dir_all(&entry_dir).await?;

        let entry = WorklistEntry::new(source_wav.clone(), dest_dir.to_path_buf(), entry_dir);
        // `symlink_metadata` (unlike `try_exists`) reports a link entry even
        // when its target is gone — resuming after `cleanup` already
        // unlinked the source must not try to recreate it (spec §3).
        if tokio::fs::symlink_metadata(&entry.source_link).await.is_err() {
            tokio::fs::symlink(source_wav, &entry.source_link).await?;
        }

        let token = ctx.push(entry);
        debug!(?source_wav, %token, "emitted new worklist entry");
        handle.put(token)?;
        tokio::task::yield_now().await;
    }

    info!(count = sources.len(), "setup finished enumerating sources");
    handle.put(Token::END)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_wav_and_rejects_other_extensions() {
        assert!(is_wav(Path::new("a.wav")));
        assert!(is_wav(Path::new("a.WAV")));
        assert!(!is_wav(Path::new("a.flac")));
        assert!(!is_wav(Path::new("a")));
    }
}
