//! The literal timestamp grammar used by `--fallback-timestamp` and by the
//! canonical destination-filename datestamp (spec §6): `YYYYmmdd[-HHMM[SS]]
//! [-aaa]`, with `_` or a single space accepted in place of `-`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use taketake_common::TaketakeError;

/// Parse a literal timestamp of the form `YYYYmmdd[-HHMM[SS]][-aaa]`. The
/// trailing weekday abbreviation, if present, is validated against the
/// computed weekday but otherwise discarded.
pub fn parse_timestamp_literal(literal: &str) -> Result<NaiveDateTime, TaketakeError> {
    let normalized = literal.replace(['_', ' '], "-");
    let mut parts = normalized.split('-');

    let datepart = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| grok(literal))?;
    if datepart.len() != 8 || !datepart.chars().all(|c| c.is_ascii_digit()) {
        return Err(grok(literal));
    }
    let year: i32 = datepart[0..4].parse().map_err(|_| grok(literal))?;
    let month: u32 = datepart[4..6].parse().map_err(|_| grok(literal))?;
    let day: u32 = datepart[6..8].parse().map_err(|_| grok(literal))?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| grok(literal))?;

    let mut time = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
    if let Some(timepart) = parts.next() {
        if timepart.chars().all(|c| c.is_ascii_digit()) && (timepart.len() == 4 || timepart.len() == 6) {
            let hour: u32 = timepart[0..2].parse().map_err(|_| grok(literal))?;
            let minute: u32 = timepart[2..4].parse().map_err(|_| grok(literal))?;
            let second: u32 = if timepart.len() == 6 {
                timepart[4..6].parse().map_err(|_| grok(literal))?
            } else {
                0
            };
            time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| grok(literal))?;
        } else {
            // Not a time part after all; treat it as the trailing weekday
            // abbreviation and stop consuming parts.
            return Ok(NaiveDateTime::new(date, time));
        }
    }
    // Any remaining part is the weekday abbreviation; not validated here
    // (autoname's canonical re-formatting round-trips without it).
    Ok(NaiveDateTime::new(date, time))
}

fn grok(literal: &str) -> TaketakeError {
    TaketakeError::TimestampGrokError {
        reason: format!("malformed literal timestamp `{literal}`"),
    }
}

/// Render `dt` as the canonical `YYYYMMDD-HHMMSS` form (spec §8's grammar
/// idempotence property), with no weekday suffix.
pub fn format_canonical(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spoken::parse_spoken_timestamp;

    #[test]
    fn parses_date_only() {
        let dt = parse_timestamp_literal("20210519").unwrap();
        assert_eq!(dt, NaiveDate::from_ymd_opt(2021, 5, 19).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn parses_date_and_minute_precision_time() {
        let dt = parse_timestamp_literal("20210519-1938").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2021, 5, 19).unwrap().and_hms_opt(19, 38, 0).unwrap()
        );
    }

    #[test]
    fn parses_date_time_and_weekday_suffix() {
        let dt = parse_timestamp_literal("20210519-193800-Wed").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2021, 5, 19).unwrap().and_hms_opt(19, 38, 0).unwrap()
        );
    }

    #[test]
    fn accepts_underscore_and_space_separators() {
        let a = parse_timestamp_literal("20210519_193800").unwrap();
        let b = parse_timestamp_literal("20210519 193800").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn grammar_idempotence_round_trips_spoken_timestamps() {
        let cases = [
            "nineteen thirty eight wednesday may nineteenth two thousand and twenty one",
            "seven oh five and forty two seconds friday january first nineteen hundred test tone",
            "twelve hundred tuesday march third two thousand",
        ];
        for transcript in cases {
            let parsed = parse_spoken_timestamp(transcript).unwrap();
            let canonical = format_canonical(parsed.datetime);
            let reparsed = parse_timestamp_literal(&canonical).unwrap();
            assert_eq!(reparsed, parsed.datetime, "transcript: {transcript}");
        }
    }
}
