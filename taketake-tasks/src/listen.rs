//! `listen`: finds the likely speech span in each source WAV, runs it
//! through the recognizer, and parses a spoken timestamp out of the
//! transcript (spec §4.2/§4.3/§4.6). A task coroutine: it needs a bounded
//! pool of concurrently in-flight recognitions with out-of-order
//! completion, which `walk`'s one-token-at-a-time loop can't express.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use taketake_common::defaults::NUM_LISTENER_TASKS;
use taketake_common::TaketakeError;
use taketake_grammar::parse_spoken_timestamp;
use taketake_progress::model::{AudioInfo, SpeechRange};
use taketake_progress::store::{load_audio_info, save_audio_info};
use taketake_progress::tagged::TaggedInstant;
use taketake_proc::registry::DURATION_PROBE;
use taketake_proc::{render, run as run_proc};
use taketake_span::{find_likely_speech_span, SpanFinderConfig};
use taketake_stepnet::{StepperHandle, Token};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::RunContext;

async fn probe_duration(path: &std::path::Path) -> Result<f64, TaketakeError> {
    let mut params = HashMap::new();
    params.insert("path", path.to_string_lossy().into_owned());
    let argv = render(&DURATION_PROBE, &params);
    let out = run_proc(&argv).await?;
    if !out.success() {
        return Err(TaketakeError::InvalidMediaFile {
            path: path.to_path_buf(),
            reason: out.stderr_string(),
        });
    }
    out.stdout_string()
        .trim()
        .parse::<f64>()
        .map_err(|_| TaketakeError::InvalidMediaFile {
            path: path.to_path_buf(),
            reason: "ffprobe produced a non-numeric duration".to_string(),
        })
}

/// One file's worth of listening: probe, span-find, recognize, parse.
/// `NoSuitableAudioSpan` and `TimestampGrokError` are swallowed into a
/// partial `AudioInfo` rather than aborting the run (spec §7: `listen` is
/// the one step allowed to downgrade those two error kinds).
async fn listen_one(ctx: &RunContext, wav_path: PathBuf) -> Result<AudioInfo, TaketakeError> {
    let duration_s = probe_duration(&wav_path).await?;

    if ctx.config.skip_speech_to_text {
        return Ok(AudioInfo {
            duration_s: Some(duration_s),
            ..AudioInfo::new()
        });
    }

    let span = match find_likely_speech_span(&wav_path, &SpanFinderConfig::default()).await {
        Ok(span) => span,
        Err(TaketakeError::NoSuitableAudioSpan { path }) => {
            warn!(?path, "no speech span found, leaving timestamp unresolved");
            return Ok(AudioInfo {
                duration_s: Some(duration_s),
                ..AudioInfo::new()
            });
        }
        Err(e) => return Err(e),
    };

    let transcript = ctx
        .recognizer
        .recognize(&wav_path, span.start_s, span.duration_s)
        .await;

    let (recognized_speech, parsed_timestamp, extra_speech) = match &transcript {
        None => (None, None, Vec::new()),
        Some(text) => match parse_spoken_timestamp(text) {
            Ok(parsed) => {
                let local = crate::context::FallbackTimestamp::Literal(parsed.datetime)
                    .resolve(&wav_path)
                    .await?;
                (Some(text.clone()), Some(TaggedInstant(local)), parsed.extras)
            }
            Err(TaketakeError::TimestampGrokError { reason }) => {
                debug!(reason, "could not parse a timestamp out of the transcript");
                (Some(text.clone()), None, Vec::new())
            }
            Err(e) => return Err(e),
        },
    };

    Ok(AudioInfo {
        duration_s: Some(duration_s),
        speech_range: Some(SpeechRange::new(span.start_s, span.duration_s)),
        recognized_speech,
        parsed_timestamp,
        extra_speech,
        ..AudioInfo::new()
    })
}

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    let semaphore = Arc::new(Semaphore::new(NUM_LISTENER_TASKS));
    let mut inflight = FuturesUnordered::new();
    let mut upstream_done = false;

    loop {
        if upstream_done && inflight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            next = handle.get(), if !upstream_done => {
                let token = next?;
                if token.is_end() {
                    upstream_done = true;
                    continue;
                }

                let entry = ctx.snapshot(token);
                if let Some(cached) = load_audio_info(&entry.wav_progress_dir).await? {
                    debug!(%token, "resuming: audio info already on disk");
                    ctx.update(token, |e| e.audio_info = cached);
                    handle.put(token)?;
                    continue;
                }

                let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
                    TaketakeError::DesynchronizationError {
                        step: "listen".to_string(),
                        extra: "recognition semaphore closed".to_string(),
                    }
                })?;
                let wav_path = entry.source_link.clone();
                inflight.push(async move {
                    let result = listen_one(ctx, wav_path).await;
                    drop(permit);
                    (token, result)
                });
            }

            Some((token, result)) = inflight.next() => {
                let entry = ctx.snapshot(token);
                let info = result?;
                save_audio_info(&entry.wav_progress_dir, &info).await?;
                ctx.update(token, |e| e.audio_info = info);
                handle.put(token)?;
            }
        }
    }

    handle.put(Token::END)?;
    Ok(())
}
