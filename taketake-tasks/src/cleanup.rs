//! `cleanup`: the terminal step. Flushes filesystem caches, removes the
//! source WAV unless configured to keep it, and optionally copies the
//! finished archive back next to the source (spec §4.2). Synchronizes on
//! `{pargen (data), xdelta (sync)}` — it only runs once both the archive
//! and its delta verification are done.

use taketake_common::TaketakeError;
use taketake_stepnet::{walk, StepperHandle};
use tracing::{debug, info, warn};

use crate::context::RunContext;

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    walk(handle, |token| async move {
        if token.is_end() {
            return Ok(());
        }
        if !ctx.config.act {
            return Ok(());
        }

        let entry = ctx.snapshot(token);
        let final_path = entry
            .flac_path
            .clone()
            .expect("pargen must have renamed the archive before cleanup runs");

        ctx.cache_flush.flush(&final_path)?;
        for par_path in &entry.par_paths {
            ctx.cache_flush.flush(par_path)?;
        }

        if !ctx.config.keep_wavs {
            if tokio::fs::try_exists(&entry.source_wav).await? {
                tokio::fs::remove_file(&entry.source_wav).await?;
                info!(%token, source = %entry.source_wav.display(), "removed source wav");
            } else {
                debug!(%token, source = %entry.source_wav.display(), "resuming: source wav already removed");
            }
        } else {
            warn!(%token, "keeping source wav per --keep-wavs");
        }

        if !ctx.config.skip_copyback {
            let parent = entry.source_wav.parent().unwrap_or(std::path::Path::new("."));
            let archive_name = final_path
                .file_name()
                .expect("final archive path always has a file name");
            let copyback_path = parent.join(archive_name);
            tokio::fs::copy(&final_path, &copyback_path).await?;
            // Copy back sequentially in archive-then-volumes order, so a
            // reader scanning the source directory sees the archive before
            // its recovery set.
            for par_path in &entry.par_paths {
                let name = par_path.file_name().expect("par2 volume path always has a file name");
                tokio::fs::copy(par_path, parent.join(name)).await?;
            }
            info!(%token, copyback = %copyback_path.display(), "copied archive back to source directory");
        }

        Ok(())
    })
    .await
}
