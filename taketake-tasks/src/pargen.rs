//! `pargen`: once both the confirmed filename and the FLAC encode are
//! ready, moves the archive to its final name under `dest_dir` and
//! generates its PAR2 recovery volumes (spec §4.2, §4.5). Synchronizes on
//! two data queues — `prompt` and `flacenc` — via `StepperHandle::get`'s
//! cross-queue intersection.

use taketake_common::defaults::DEFAULT_PAR2_VOLUMES;
use taketake_common::TaketakeError;
use taketake_fec::{create_par2_volumes, find_covering_par2, repair_par2, verify_par2};
use taketake_stepnet::{walk, StepperHandle};
use tracing::{debug, warn};

use crate::context::RunContext;

async fn collect_volumes(dest_dir: &std::path::Path, stem: &str) -> Result<Vec<std::path::PathBuf>, TaketakeError> {
    let mut volumes = Vec::new();
    let mut entries = tokio::fs::read_dir(dest_dir).await?;
    let prefix = format!("{stem}.vol");
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(&prefix) && name.ends_with(".par2") {
                volumes.push(entry.path());
            }
        }
    }
    volumes.sort();
    Ok(volumes)
}

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    walk(handle, |token| async move {
        if token.is_end() {
            return Ok(());
        }
        if !ctx.config.act {
            return Ok(());
        }

        let entry = ctx.snapshot(token);
        let flac_path = entry
            .flac_path
            .clone()
            .expect("flacenc must have produced a flac path before pargen runs");
        let final_name = entry
            .fname_prompted
            .clone()
            .expect("prompt must have confirmed a filename before pargen runs");

        tokio::fs::create_dir_all(&entry.dest_dir).await?;
        let final_path = entry.dest_dir.join(&final_name);
        if flac_path != final_path {
            tokio::fs::rename(&flac_path, &final_path).await?;
        }

        // A full volume set from a prior run is a resume candidate, but only
        // if it actually verifies; a partial one (e.g. one volume deleted,
        // scenario S7) goes straight to regeneration.
        let existing = collect_volumes(&entry.dest_dir, &final_name).await?;
        if existing.len() >= DEFAULT_PAR2_VOLUMES as usize {
            let covering = find_covering_par2(&entry.dest_dir, &final_name)
                .await?
                .ok_or_else(|| TaketakeError::MissingPar2File {
                    path: final_path.clone(),
                })?;

            let intact = match verify_par2(&covering).await {
                Ok(()) => true,
                Err(_) => {
                    warn!(%token, ?covering, "par2 verify failed, attempting repair");
                    repair_par2(&covering).await.is_ok()
                }
            };

            if intact {
                debug!(%token, volumes = existing.len(), "resuming: par2 volumes verified intact");
                ctx.update(token, |e| {
                    e.flac_path = Some(final_path);
                    e.par_paths = existing;
                });
                return Ok(());
            }
            warn!(%token, ?covering, "par2 repair failed, regenerating the volume set");
        }

        let source_size = tokio::fs::metadata(&final_path).await?.len();
        create_par2_volumes(&final_path, source_size).await?;

        let volumes = collect_volumes(&entry.dest_dir, &final_name).await?;
        debug!(%token, ?final_path, volumes = volumes.len(), "pargen produced recovery volumes");

        ctx.update(token, |e| {
            e.flac_path = Some(final_path);
            e.par_paths = volumes;
        });
        Ok(())
    })
    .await
}
