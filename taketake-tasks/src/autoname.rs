//! `autoname`: composes the canonical destination filename guess for each
//! token (spec §4.2, §6). For tokens with a recognized timestamp, that
//! timestamp is canonical; for the rest, a backfill policy applies (the
//! nearest prior in-order token's timestamp plus that file's duration),
//! falling back to the run's configured `fallback_timestamp` policy when no
//! prior token has one. Relies on `reorder` upstream for in-order arrival.

use chrono::{DateTime, Local};
use taketake_common::TaketakeError;
use taketake_progress::store::save_guess;
use taketake_stepnet::{walk, StepperHandle, Token};
use tracing::debug;

use crate::context::RunContext;

/// `{prefix}.{datestamp}.{notes}{duration}.{instrument}.{orig_stem}.flac`
/// (spec §6).
fn compose_filename(
    prefix: &str,
    instrument: &str,
    orig_stem: &str,
    timestamp: DateTime<Local>,
    duration_s: f64,
    extra_speech: &[String],
) -> String {
    let datestamp = format_datestamp(timestamp);
    let duration = format_duration(duration_s);
    let notes = if extra_speech.is_empty() {
        String::new()
    } else {
        format!("{}.", extra_speech.join("-"))
    };
    format!("{prefix}.{datestamp}.{notes}{duration}.{instrument}.{orig_stem}.flac")
}

fn format_datestamp(ts: DateTime<Local>) -> String {
    let pattern = if ts.format("%S").to_string() == "00" {
        "%Y%m%d-%H%M-%a"
    } else {
        "%Y%m%d-%H%M%S-%a"
    };
    ts.format(pattern).to_string().to_lowercase()
}

fn format_duration(total_s: f64) -> String {
    let total = total_s.round().max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

pub async fn run(handle: &mut StepperHandle, ctx: &RunContext) -> Result<(), TaketakeError> {
    let mut next_available: Option<DateTime<Local>> = None;

    walk(handle, |token| {
        let next_available = &mut next_available;
        async move {
            if token.is_end() {
                return Ok(());
            }

            let entry = ctx.snapshot(token);
            let duration_s = entry.audio_info.duration_s.unwrap_or(0.0);

            let resolved = match entry.audio_info.parsed_timestamp.as_ref() {
                Some(tagged) => tagged.0,
                None => match *next_available {
                    Some(ts) => ts,
                    None => ctx.config.fallback_timestamp.resolve(&entry.source_wav).await?,
                },
            };

            *next_available = Some(resolved + chrono::Duration::seconds(duration_s.round() as i64));

            let orig_stem = entry
                .source_wav
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio")
                .to_string();

            let fname_guess = compose_filename(
                &ctx.config.prefix,
                &ctx.config.instrument,
                &orig_stem,
                resolved,
                duration_s,
                &entry.audio_info.extra_speech,
            );
            debug!(%token, %fname_guess, "composed filename guess");
            if ctx.config.act {
                save_guess(&entry.wav_progress_dir, &fname_guess).await?;
            }

            ctx.update(token, |e| {
                e.timestamp = Some(resolved);
                e.fname_guess = Some(fname_guess);
            });
            Ok(())
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_whole_minute_datestamp_without_seconds() {
        let ts = Local.with_ymd_and_hms(2021, 5, 19, 19, 38, 0).unwrap();
        assert_eq!(format_datestamp(ts), "20210519-1938-wed");
    }

    #[test]
    fn formats_datestamp_with_seconds_when_nonzero() {
        let ts = Local.with_ymd_and_hms(2021, 5, 19, 19, 38, 42).unwrap();
        assert_eq!(format_datestamp(ts), "20210519-193842-wed");
    }

    #[test]
    fn formats_duration_with_only_nonzero_units() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(2.0), "2s");
        assert_eq!(format_duration(3600.0 * 5.0 + 2.0), "5h2s");
        assert_eq!(format_duration(125.0), "2m5s");
    }

    #[test]
    fn composes_the_full_canonical_name() {
        let ts = Local.with_ymd_and_hms(2021, 5, 19, 19, 38, 0).unwrap();
        let name = compose_filename("piano", "piano", "input", ts, 3602.0, &["test".into(), "tone".into()]);
        assert_eq!(name, "piano.20210519-1938-wed.test-tone.1h2s.piano.input.flac");
    }
}
