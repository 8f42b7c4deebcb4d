//! `xdelta`: delta-encodes each FLAC archive against its source WAV and
//! verifies the pair is byte-identical (spec §4.2, §4.4). Synchronizes on
//! `flacenc`'s end-token barrier before its first `get` (spec §4.2).

use std::collections::HashMap;

use taketake_common::TaketakeError;
use taketake_progress::store::xdelta_path;
use taketake_proc::registry::FLAC_DECODE_STDOUT;
use taketake_proc::{render, run as run_proc};
use taketake_stepnet::{walk, StepperHandle};
use taketake_verify::{encode_delta, verify_byte_identical};
use tracing::debug;

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
        let flac_path = entry
            .flac_path
            .clone()
            .expect("flacenc must have produced a flac path before xdelta runs");
        let xd_path = xdelta_path(&entry.wav_progress_dir);

        // A delta from a prior completed run is trustworthy as-is; only
        // `pargen`'s rename might still be outstanding (scenario S7).
        if tokio::fs::try_exists(&xd_path).await? {
            debug!(%token, ?xd_path, "resuming: delta already verified");
            return Ok(());
        }

        encode_delta(&flac_path, &entry.source_link, &xd_path).await?;

        let source_size = tokio::fs::metadata(&entry.source_link).await?.len();
        let mut params = HashMap::new();
        params.insert("flac_path", flac_path.to_string_lossy().into_owned());
        let decode_argv = render(&FLAC_DECODE_STDOUT, &params);
        let decoded = run_proc(&decode_argv).await?;
        let target_size = decoded.stdout.len() as u64;

        verify_byte_identical(&xd_path, source_size, target_size, &ctx.cancel).await?;
        debug!(%token, ?xd_path, "xdelta verified byte-identical");
        Ok(())
    })
    .await
}
