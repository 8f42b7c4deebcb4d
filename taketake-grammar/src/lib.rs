//! Spoken and literal timestamp grammars (spec §4.6, §6). Generalizes the
//! teacher's `stream_prefix::parse_timestamp_prefix` recursive-descent
//! style from a fixed filename prefix to free-form English date+time
//! phrases, plus the literal form used by `--fallback-timestamp`.

mod lexicon;
mod literal;
mod spoken;

pub use literal::{format_canonical, parse_timestamp_literal};
pub use spoken::{parse_spoken_timestamp, ParsedTimestamp};
