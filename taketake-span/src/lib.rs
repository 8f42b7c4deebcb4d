//! Likely-speech span finder (spec §4.3): run the media analyzer's silence
//! detector over the lead-in of a source file, invert the reported silent
//! intervals, and pick the first non-silent span long enough to be worth
//! transcribing. Grounded on the windowing style of
//! `whisperd::audio_segmenter::AudioSegmenter`, generalized from live VAD
//! framing to offline interval parsing over one `ffmpeg` stderr dump.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::{debug, trace};

use taketake_common::defaults::{
    EPSILON_S, FILE_SCAN_DURATION_S, MAX_TALK_DURATION_S, MIN_TALK_DURATION_S,
    SILENCE_MIN_DURATION_S, SILENCE_THRESHOLD_DBFS, TALK_ATTACK_S, TALK_RELEASE_S,
};
use taketake_common::TaketakeError;
use taketake_proc::registry::SILENCE_DETECT;
use taketake_proc::{render, run};

/// A candidate (or chosen) non-silent interval, in seconds from the start
/// of the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start_s: f64,
    pub duration_s: f64,
}

impl Span {
    pub fn end_s(&self) -> f64 {
        self.start_s + self.duration_s
    }
}

/// Tunables for [`find_likely_speech_span`]. Defaults mirror
/// `taketake_common::defaults`; tests shrink the scan window so fixtures
/// stay small.
#[derive(Debug, Clone, Copy)]
pub struct SpanFinderConfig {
    pub threshold_dbfs: f64,
    pub silence_min_duration_s: f64,
    pub scan_duration_s: f64,
    pub min_talk_duration_s: f64,
    pub max_talk_duration_s: f64,
    pub attack_s: f64,
    pub release_s: f64,
}

impl Default for SpanFinderConfig {
    fn default() -> Self {
        Self {
            threshold_dbfs: SILENCE_THRESHOLD_DBFS,
            silence_min_duration_s: SILENCE_MIN_DURATION_S,
            scan_duration_s: FILE_SCAN_DURATION_S,
            min_talk_duration_s: MIN_TALK_DURATION_S,
            max_talk_duration_s: MAX_TALK_DURATION_S,
            attack_s: TALK_ATTACK_S,
            release_s: TALK_RELEASE_S,
        }
    }
}

/// Run the silence detector over `path` and return the first non-silent
/// span at least `cfg.min_talk_duration_s` long, widened by the attack and
/// release margins and capped at `cfg.max_talk_duration_s`.
pub async fn find_likely_speech_span(
    path: &Path,
    cfg: &SpanFinderConfig,
) -> Result<Span, TaketakeError> {
    let mut params = HashMap::new();
    params.insert("path", path.to_string_lossy().into_owned());
    params.insert("threshold_dbfs", cfg.threshold_dbfs.to_string());
    params.insert("min_duration_s", cfg.silence_min_duration_s.to_string());
    params.insert("scan_duration_s", cfg.scan_duration_s.to_string());

    let argv = render(&SILENCE_DETECT, &params);
    let out = run(&argv).await?;
    // ffmpeg's silencedetect writes its report to stderr regardless of exit
    // status; a nonzero status here means the input itself was unreadable.
    if !out.success() {
        return Err(TaketakeError::InvalidMediaFile {
            path: path.to_path_buf(),
            reason: out.stderr_string(),
        });
    }

    let silences = parse_silences(&out.stderr_string(), cfg.scan_duration_s);
    trace!(?silences, "parsed silence intervals");
    let talk_spans = invert(&silences, cfg.scan_duration_s);
    debug!(?talk_spans, "candidate non-silent spans");

    let chosen = talk_spans
        .into_iter()
        .find(|(start, end)| end - start + EPSILON_S >= cfg.min_talk_duration_s)
        .ok_or_else(|| TaketakeError::NoSuitableAudioSpan {
            path: path.to_path_buf(),
        })?;

    Ok(widen(chosen, cfg))
}

fn parse_silences(stderr: &str, scan_duration_s: f64) -> Vec<(f64, f64)> {
    let start_re = Regex::new(r"silence_start:\s*(-?[0-9.]+)").unwrap();
    let end_re =
        Regex::new(r"silence_end:\s*(-?[0-9.]+)\s*\|\s*silence_duration:\s*(-?[0-9.]+)").unwrap();

    let mut intervals = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(caps) = start_re.captures(line) {
            let start: f64 = caps[1].parse().unwrap_or(0.0);
            open_start = Some(start);
            continue;
        }
        if let Some(caps) = end_re.captures(line) {
            let end: f64 = caps[1].parse().unwrap_or(scan_duration_s);
            let start = open_start.take().unwrap_or(0.0);
            intervals.push((start, end));
        }
    }
    // A silence_start with no matching silence_end means the file is
    // silent out to the scan cap.
    if let Some(start) = open_start {
        intervals.push((start, scan_duration_s));
    }
    intervals
}

/// Invert a list of silent intervals (assumed sorted by start, as ffmpeg
/// emits them) against `[0, scan_duration_s]`, returning the non-silent
/// gaps between them.
fn invert(silences: &[(f64, f64)], scan_duration_s: f64) -> Vec<(f64, f64)> {
    let mut spans = Vec::new();
    let mut cursor = 0.0;
    for &(start, end) in silences {
        if start > cursor {
            spans.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < scan_duration_s {
        spans.push((cursor, scan_duration_s));
    }
    spans
}

fn widen((start, end): (f64, f64), cfg: &SpanFinderConfig) -> Span {
    let widened_start = (start - cfg.attack_s).max(0.0);
    let widened_end = (end + cfg.release_s).min(cfg.scan_duration_s);
    let capped_end = widened_end.min(widened_start + cfg.max_talk_duration_s);
    Span {
        start_s: widened_start,
        duration_s: capped_end - widened_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SpanFinderConfig {
        SpanFinderConfig {
            threshold_dbfs: -55.0,
            silence_min_duration_s: 0.5,
            scan_duration_s: 90.0,
            min_talk_duration_s: 2.5,
            max_talk_duration_s: 15.0,
            attack_s: 0.2,
            release_s: 0.2,
        }
    }

    #[test]
    fn parses_a_silence_start_end_pair() {
        let stderr = "\
[silencedetect @ 0x0] silence_start: 0
[silencedetect @ 0x0] silence_end: 3.2 | silence_duration: 3.2
[silencedetect @ 0x0] silence_start: 20
";
        let silences = parse_silences(stderr, 90.0);
        assert_eq!(silences, vec![(0.0, 3.2), (20.0, 90.0)]);
    }

    #[test]
    fn inverts_silences_into_talk_spans() {
        let silences = vec![(0.0, 3.2), (20.0, 90.0)];
        let spans = invert(&silences, 90.0);
        assert_eq!(spans, vec![(3.2, 20.0)]);
    }

    #[test]
    fn no_leading_or_trailing_silence_yields_full_span() {
        let spans = invert(&[], 90.0);
        assert_eq!(spans, vec![(0.0, 90.0)]);
    }

    #[test]
    fn widens_and_caps_the_chosen_span() {
        let span = widen((3.2, 6.0), &cfg());
        assert!((span.start_s - 3.0).abs() < 1e-9);
        assert!((span.duration_s - 3.0).abs() < 1e-9);
    }

    #[test]
    fn widen_caps_overlong_spans_at_max_talk_duration() {
        let span = widen((1.0, 30.0), &cfg());
        assert!((span.start_s - 0.8).abs() < 1e-9);
        assert!((span.duration_s - 15.0).abs() < 1e-9);
    }

    #[test]
    fn short_talk_span_is_skipped_in_favor_of_the_next() {
        // 1.0s talk, then silence, then a 5s talk span: the short one must
        // not satisfy min_talk_duration_s.
        let silences = vec![(1.0, 1.6)];
        let spans = invert(&silences, 10.0);
        assert_eq!(spans, vec![(0.0, 1.0), (1.6, 10.0)]);
        let chosen = spans
            .into_iter()
            .find(|(s, e)| e - s + EPSILON_S >= 2.5)
            .unwrap();
        assert_eq!(chosen, (1.6, 10.0));
    }
}
