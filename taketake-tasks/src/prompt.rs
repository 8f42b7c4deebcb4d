//! `prompt`: shows the autoname guess to the operator and lets them accept,
//! rename, or replay the chosen speech span before the filename is
//! finalized (spec §4.2, §6). Skippable via `--no-prompt`, in which case
//! the guess is accepted as-is. The interactive style itself is an
//! out-of-scope external collaborator (spec §1); this only drives
//! `inquire`, mirroring `whisperd::model::prompt_model`'s use of it.

use std::collections::HashMap;

use taketake_common::TaketakeError;
use taketake_progress::store::{load_provided, save_provided};
use taketake_proc::registry::PLAYER_OSD;
use taketake_proc::{render, run as run_proc};
use taketake_stepnet::{walk, StepperHandle};
use tracing::{debug, info, warn};

use crate::context::RunContext;

async fn play_preview(wav_path: &std::path::Path, start_s: f64) {
    let mut params = HashMap::new();
    params.insert("path", wav_path.to_string_lossy().into_owned());
    params.insert("start_s", start_s.to_string());
    params.insert("osd_text", "taketake preview".to_string());
    let argv = render(&PLAYER_OSD, &params);
    if let Err(e) = run_proc(&argv).await {
        warn!(error = %e, "player invocation failed");
    }
}

/// Blocking `inquire` interaction, run via `spawn_blocking` since it reads
/// the terminal synchronously. A reply of `p` means "replay the clip and
/// ask again" — handled by the async caller, not here.
fn ask(guess: String) -> Result<String, TaketakeError> {
    inquire::Text::new("filename")
        .with_default(&guess)
        .with_help_message("Enter to accept, type a new name, or `p` to replay the clip")
        .prompt()
        .map_err(|e| TaketakeError::PromptError(e.to_string()))
}

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    walk(handle, |token| async move {
        if token.is_end() {
            return Ok(());
        }

        let entry = ctx.snapshot(token);

        // Resuming: a name the operator already confirmed stands, without
        // asking again (spec §3's resume contract, scenario S7).
        if let Some(cached) = load_provided(&entry.wav_progress_dir).await? {
            debug!(%token, filename = %cached, "resuming: filename already confirmed");
            ctx.update(token, |e| e.fname_prompted = Some(cached));
            return Ok(());
        }

        let guess = entry.fname_guess.clone().unwrap_or_else(|| "untitled.flac".to_string());

        let prompted = if !ctx.config.prompt_enabled {
            guess.clone()
        } else {
            let mut answer = guess.clone();
            loop {
                let reply = tokio::task::spawn_blocking({
                    let answer = answer.clone();
                    move || ask(answer)
                })
                .await
                .map_err(|e| TaketakeError::PromptError(e.to_string()))??;

                if reply == "p" {
                    let start_s = entry
                        .audio_info
                        .speech_range
                        .as_ref()
                        .map(|r| r.start_s)
                        .unwrap_or(0.0);
                    play_preview(&entry.source_link, start_s).await;
                    continue;
                }
                answer = reply;
                break;
            }
            answer
        };

        info!(%token, filename = %prompted, "filename confirmed");
        if ctx.config.act {
            save_provided(&entry.wav_progress_dir, &prompted).await?;
        }
        ctx.update(token, |e| e.fname_prompted = Some(prompted));
        Ok(())
    })
    .await
}
