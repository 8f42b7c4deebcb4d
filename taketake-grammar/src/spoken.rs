//! Recursive-descent parser over a word stream: time phrase, date phrase,
//! year (spec §4.6). Each nonterminal pops from the front of the token
//! list and returns its partial result, the same shape as the teacher's
//! `stream_prefix::parse_timestamp_prefix`, generalized from a fixed
//! filename prefix to free-form spoken English.

use std::collections::VecDeque;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use taketake_common::TaketakeError;

use crate::lexicon::{compact_ordinal, is_tens_word, month_number, numword, ordinal_word, weekday};

/// Result of parsing a spoken transcript: the recovered instant plus
/// whatever words were left over as operator notes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTimestamp {
    pub datetime: NaiveDateTime,
    pub extras: Vec<String>,
}

/// Parse a spoken English date+time transcript (spec §4.6).
pub fn parse_spoken_timestamp(transcript: &str) -> Result<ParsedTimestamp, TaketakeError> {
    let mut tokens: VecDeque<String> = transcript
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    let (hour, minute, second) = parse_time_phrase(&mut tokens)?;
    let (date, weekday_seen) = parse_date_phrase(&mut tokens)?;

    if let Some(seen) = weekday_seen {
        let computed = date.weekday();
        if seen != computed {
            tracing::warn!(
                parsed = %date,
                spoken_weekday = ?seen,
                computed_weekday = ?computed,
                "spoken weekday disagrees with computed weekday; accepting date anyway"
            );
        }
    }

    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
        TaketakeError::TimestampGrokError {
            reason: format!("invalid time of day {hour:02}:{minute:02}:{second:02}"),
        }
    })?;

    let extras = tokens.into_iter().collect();
    Ok(ParsedTimestamp {
        datetime: NaiveDateTime::new(date, time),
        extras,
    })
}

fn peek_is(tokens: &VecDeque<String>, words: &[&str]) -> bool {
    tokens
        .front()
        .map(|t| words.contains(&t.as_str()))
        .unwrap_or(false)
}

fn consume_if(tokens: &mut VecDeque<String>, words: &[&str]) -> bool {
    if peek_is(tokens, words) {
        tokens.pop_front();
        true
    } else {
        false
    }
}

/// Consume a literal `oh clock` pair (an alternate spelling of "o'clock"),
/// checked against the raw tokens, ahead of any numeric substitution.
fn consume_oh_clock(tokens: &mut VecDeque<String>) -> bool {
    if tokens.len() >= 2 && tokens[0] == "oh" && tokens[1] == "clock" {
        tokens.pop_front();
        tokens.pop_front();
        true
    } else {
        false
    }
}

/// A "digit pair": a leading number word, optionally joined with a second
/// number word when the first is 0 or >=20 and the second is <10.
fn digit_pair(tokens: &mut VecDeque<String>) -> Option<u32> {
    let first = numword(tokens.front()?)?;
    tokens.pop_front();
    if first == 0 || first >= 20 {
        if let Some(second_tok) = tokens.front() {
            if let Some(second) = numword(second_tok) {
                if second < 10 {
                    tokens.pop_front();
                    return Some(first + second);
                }
            }
        }
    }
    Some(first)
}

fn parse_time_phrase(tokens: &mut VecDeque<String>) -> Result<(u32, u32, u32), TaketakeError> {
    let first = digit_pair(tokens).ok_or_else(|| TaketakeError::TimestampGrokError {
        reason: "expected a spoken time at the start of the transcript".to_string(),
    })?;

    if consume_if(tokens, &["second", "seconds"]) {
        return Ok((0, 0, first));
    }
    if consume_if(tokens, &["minute", "minutes"]) {
        consume_if(tokens, &["and"]);
        let second = digit_pair(tokens).unwrap_or(0);
        consume_if(tokens, &["second", "seconds"]);
        return Ok((0, first, second));
    }

    let hour = first;
    consume_if(tokens, &["hundred"]);
    consume_if(tokens, &["hour", "hours"]);
    consume_oh_clock(tokens);
    consume_if(tokens, &["and"]);

    match digit_pair(tokens) {
        Some(minute) => {
            consume_if(tokens, &["minute", "minutes"]);
            consume_if(tokens, &["and"]);
            let second = digit_pair(tokens).unwrap_or(0);
            consume_if(tokens, &["second", "seconds"]);
            Ok((hour, minute, second))
        }
        None => Ok((hour, 0, 0)),
    }
}

fn try_weekday(tokens: &mut VecDeque<String>) -> Option<chrono::Weekday> {
    let wd = weekday(tokens.front()?)?;
    tokens.pop_front();
    Some(wd)
}

fn try_month(tokens: &mut VecDeque<String>) -> Option<u32> {
    let m = month_number(tokens.front()?)?;
    tokens.pop_front();
    Some(m)
}

fn parse_day(tokens: &mut VecDeque<String>) -> Result<u32, TaketakeError> {
    if let Some(tok) = tokens.front() {
        if let Some(day) = ordinal_word(tok) {
            tokens.pop_front();
            return Ok(day);
        }
        if let Some(day) = compact_ordinal(tok) {
            tokens.pop_front();
            return Ok(day);
        }
        if let Some(tens) = numword(tok) {
            if is_tens_word(tens) {
                if let Some(next) = tokens.get(1) {
                    if let Some(ones) = ordinal_word(next) {
                        if ones < 10 {
                            tokens.pop_front();
                            tokens.pop_front();
                            return Ok(tens + ones);
                        }
                    }
                }
            }
        }
    }
    Err(TaketakeError::TimestampGrokError {
        reason: "expected a day-of-month ordinal".to_string(),
    })
}

/// `[hundred(s)] [and] tens-and-ones`, used for the tail of a `N thousand`
/// year and the optional last-two-digits of a `19..29 hundred` year.
fn parse_cardinal_0_999(tokens: &mut VecDeque<String>) -> u32 {
    let hundreds = if let Some(tok) = tokens.front() {
        numword(tok).filter(|&n| (1..=9).contains(&n))
    } else {
        None
    };
    let mut total = 0;
    if let Some(h) = hundreds {
        if tokens.len() >= 2 && tokens[1] == "hundred" {
            tokens.pop_front();
            tokens.pop_front();
            total += h * 100;
            consume_if(tokens, &["and"]);
        }
    }
    total + digit_pair(tokens).unwrap_or(0)
}

fn parse_year(tokens: &mut VecDeque<String>) -> Result<i32, TaketakeError> {
    let leading = tokens
        .front()
        .and_then(|t| numword(t))
        .ok_or_else(|| TaketakeError::TimestampGrokError {
            reason: "expected a spoken year".to_string(),
        })?;

    let year = if (1..=3).contains(&leading) && tokens.get(1).map(|t| t.as_str()) == Some("thousand")
    {
        tokens.pop_front(); // the leading digit
        tokens.pop_front(); // "thousand"
        consume_if(tokens, &["and"]);
        let tail = parse_cardinal_0_999(tokens);
        (leading * 1000 + tail) as i32
    } else if (19..=29).contains(&leading) {
        let first_two = digit_pair(tokens).unwrap();
        if consume_if(tokens, &["hundred"]) {
            consume_if(tokens, &["and"]);
            let last_two = digit_pair(tokens).unwrap_or(0);
            (first_two * 100 + last_two) as i32
        } else {
            consume_if(tokens, &["and"]);
            let last_two = digit_pair(tokens).ok_or_else(|| TaketakeError::TimestampGrokError {
                reason: "expected the last two digits of a spoken year".to_string(),
            })?;
            (first_two * 100 + last_two) as i32
        }
    } else {
        return Err(TaketakeError::TimestampGrokError {
            reason: format!("spoken year must start `1|2|3 thousand` or `19..29`, got {leading}"),
        });
    };

    if !(1900..=2999).contains(&year) {
        return Err(TaketakeError::TimestampGrokError {
            reason: format!("year {year} out of accepted range 1900..2999"),
        });
    }
    Ok(year)
}

fn parse_date_phrase(
    tokens: &mut VecDeque<String>,
) -> Result<(NaiveDate, Option<chrono::Weekday>), TaketakeError> {
    let weekday_before = try_weekday(tokens);
    let month = try_month(tokens).ok_or_else(|| TaketakeError::TimestampGrokError {
        reason: "expected a month name".to_string(),
    })?;
    let day = parse_day(tokens)?;
    let weekday_after = if weekday_before.is_none() {
        try_weekday(tokens)
    } else {
        None
    };
    let year = parse_year(tokens)?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        TaketakeError::TimestampGrokError {
            reason: format!("invalid calendar date {year:04}-{month:02}-{day:02}"),
        }
    })?;

    Ok((date, weekday_before.or(weekday_after)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn expect(transcript: &str, expected: &str, extras: &[&str]) {
        let parsed = parse_spoken_timestamp(transcript).unwrap();
        let expected = NaiveDateTime::parse_from_str(expected, "%Y-%m-%dT%H:%M:%S").unwrap();
        assert_eq!(parsed.datetime, expected, "transcript: {transcript}");
        assert_eq!(parsed.extras, extras, "transcript: {transcript}");
    }

    #[test]
    fn s1_spoken_timestamp() {
        expect(
            "nineteen thirty eight wednesday may nineteenth two thousand and twenty one",
            "2021-05-19T19:38:00",
            &[],
        );
    }

    #[test]
    fn s2_with_seconds_and_notes() {
        expect(
            "seven oh five and forty two seconds friday january first nineteen hundred test tone",
            "1900-01-01T07:05:42",
            &["test", "tone"],
        );
    }

    #[test]
    fn s3_missing_minutes() {
        expect(
            "twelve hundred tuesday march third two thousand",
            "2000-03-03T12:00:00",
            &[],
        );
    }

    #[test]
    fn month_missing_is_a_grok_error() {
        let err = parse_spoken_timestamp("twelve hundred the third two thousand").unwrap_err();
        assert!(matches!(err, TaketakeError::TimestampGrokError { .. }));
    }

    #[test]
    fn year_out_of_range_is_a_grok_error() {
        let err =
            parse_spoken_timestamp("twelve hundred tuesday march third three thousand").unwrap_err();
        assert!(matches!(err, TaketakeError::TimestampGrokError { .. }));
    }

    #[test]
    fn mismatched_weekday_is_accepted_with_a_warning() {
        // 2021-05-19 is actually a Wednesday, not a Monday; the parser must
        // still accept it.
        let parsed = parse_spoken_timestamp(
            "nineteen thirty eight monday may nineteenth two thousand and twenty one",
        )
        .unwrap();
        assert_eq!(parsed.datetime.date().weekday(), chrono::Weekday::Wed);
    }

    #[test]
    fn compact_ordinal_day_is_accepted() {
        expect(
            "twelve hundred tuesday march 3rd two thousand",
            "2000-03-03T12:00:00",
            &[],
        );
    }
}
