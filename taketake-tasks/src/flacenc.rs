//! `flacenc`: encodes each source WAV to FLAC (spec §4.2, §4.4). Feeds
//! both `pargen` and `xdelta`; its end-token also forwards as a barrier
//! into `xdelta`'s presync (spec §4.2's literal wiring for this step).

use std::collections::HashMap;

use taketake_common::TaketakeError;
use taketake_progress::store::{interrupted_flac_name, load_provided, xdelta_path};
use taketake_proc::registry::FLAC_ENCODE;
use taketake_proc::{check_status, render, run as run_proc};
use taketake_stepnet::{walk, StepperHandle};
use tracing::{debug, warn};

use crate::context::RunContext;

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    walk(handle, |token| async move {
        if token.is_end() {
            return Ok(());
        }

        let entry = ctx.snapshot(token);
        if !ctx.config.act {
            debug!(%token, "no-act: skipping flac encode");
            return Ok(());
        }

        // Resuming: if a prior run already renamed this encode to its final
        // destination, there's nothing left for this step to do.
        if let Some(provided) = load_provided(&entry.wav_progress_dir).await? {
            let final_path = entry.dest_dir.join(&provided);
            if tokio::fs::try_exists(&final_path).await? {
                debug!(%token, ?final_path, "resuming: archive already renamed to its final name");
                ctx.update(token, |e| e.flac_path = Some(final_path));
                return Ok(());
            }
        }

        let flac_path = entry.wav_progress_dir.join(format!(
            "{}.flac",
            entry
                .source_wav
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio")
        ));

        // A FLAC that already has a verified delta beside it is a completed
        // encode from a prior run, not a stale partial one; trust it and
        // skip re-encoding (spec §3's resume contract, scenario S7).
        if tokio::fs::try_exists(&flac_path).await?
            && tokio::fs::try_exists(xdelta_path(&entry.wav_progress_dir)).await?
        {
            debug!(%token, ?flac_path, "resuming: flac already encoded and verified");
            ctx.update(token, |e| e.flac_path = Some(flac_path));
            return Ok(());
        }

        // Otherwise a FLAC left behind by a prior interrupted run can't be
        // trusted; roll it aside before re-encoding.
        if tokio::fs::try_exists(&flac_path).await? {
            let ts = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
            let rolled = entry.wav_progress_dir.join(interrupted_flac_name(&ts));
            warn!(?flac_path, ?rolled, "rolling aside a stale partial encode");
            tokio::fs::rename(&flac_path, &rolled).await?;
        }

        let mut params = HashMap::new();
        params.insert("flac_path", flac_path.to_string_lossy().into_owned());
        params.insert("wav_path", entry.source_link.to_string_lossy().into_owned());
        let argv = render(&FLAC_ENCODE, &params);
        let out = run_proc(&argv).await?;
        check_status("flac", &out)?;

        debug!(%token, ?flac_path, "flac encode complete");
        ctx.update(token, |e| e.flac_path = Some(flac_path));
        Ok(())
    })
    .await
}
