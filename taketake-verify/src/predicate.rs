//! The verification predicate over a delta encoder's `printdelta` dump
//! (spec §4.4): every header field named in the spec must match, and the
//! instruction stream must be exactly one full-length copy from offset 0.

use std::collections::HashMap;

use regex::Regex;
use taketake_common::TaketakeError;

const REQUIRED_FIELDS: &[&str] = &[
    "copy window length",
    "copy window offset",
    "target window length",
    "data section length",
];

fn mismatch(offending_line: impl Into<String>) -> TaketakeError {
    TaketakeError::XdeltaMismatch {
        offending_line: offending_line.into(),
    }
}

fn extract_field(line: &str, label: &str) -> Option<u64> {
    if !line.to_ascii_lowercase().contains(label) {
        return None;
    }
    line.split_whitespace().last()?.parse().ok()
}

fn is_instruction_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(|c: char| c.is_ascii_hexdigit())
        && (trimmed.contains("CPY_") || trimmed.contains("ADD_") || trimmed.contains("RUN_"))
}

/// Check `printdelta_stdout` against `source_size`/`target_size`, both of
/// which must already be known equal and >= the delta tool's 18-byte
/// minimum before calling this (see [`taketake_common::defaults::XDELTA_MIN_FILE_SIZE`]).
pub fn check_printdelta_output(printdelta_stdout: &str, source_size: u64) -> Result<(), TaketakeError> {
    let mut fields: HashMap<&str, u64> = HashMap::new();
    let mut instruction_lines = Vec::new();

    for line in printdelta_stdout.lines() {
        for &label in REQUIRED_FIELDS {
            if let Some(v) = extract_field(line, label) {
                fields.insert(label, v);
            }
        }
        if is_instruction_line(line) {
            instruction_lines.push(line.to_string());
        }
    }

    let require = |label: &str, expected: u64| -> Result<(), TaketakeError> {
        match fields.get(label) {
            Some(&v) if v == expected => Ok(()),
            Some(&v) => Err(mismatch(format!("{label}: {v} (expected {expected})"))),
            None => Err(mismatch(format!("missing header field `{label}` in printdelta output"))),
        }
    };
    require("copy window length", source_size)?;
    require("copy window offset", 0)?;
    require("target window length", source_size)?;
    require("data section length", 0)?;

    if instruction_lines.len() != 1 {
        return Err(mismatch(
            instruction_lines
                .first()
                .cloned()
                .unwrap_or_else(|| "no instruction lines in printdelta output".to_string()),
        ));
    }

    let line = &instruction_lines[0];
    let instr_re = Regex::new(r"CPY_0\s+(\d+)\s+@(\d+)").unwrap();
    let caps = instr_re.captures(line).ok_or_else(|| mismatch(line.clone()))?;
    let size: u64 = caps[1].parse().unwrap_or(0);
    let offset: u64 = caps[2].parse().unwrap_or(u64::MAX);
    if size != source_size || offset != 0 {
        return Err(mismatch(line.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_dump(size: u64) -> String {
        format!(
            "VCDIFF copy window length:   {size}\n\
             VCDIFF copy window offset:   0\n\
             VCDIFF target window length: {size}\n\
             VCDIFF data section length:  0\n\
             000000 019 CPY_0 {size} @0\n"
        )
    }

    #[test]
    fn accepts_a_single_full_length_copy() {
        check_printdelta_output(&good_dump(4096), 4096).unwrap();
    }

    #[test]
    fn s5_rejects_a_non_cpy_0_instruction() {
        let dump = "VCDIFF copy window length:   4096\n\
                    VCDIFF copy window offset:   0\n\
                    VCDIFF target window length: 4096\n\
                    VCDIFF data section length:  0\n\
                    000000 01a ADD_1 12 @0\n";
        let err = check_printdelta_output(dump, 4096).unwrap_err();
        match err {
            TaketakeError::XdeltaMismatch { offending_line } => {
                assert!(offending_line.contains("ADD_1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_nonzero_copy_offset() {
        let dump = "VCDIFF copy window length:   4096\n\
                    VCDIFF copy window offset:   10\n\
                    VCDIFF target window length: 4096\n\
                    VCDIFF data section length:  0\n\
                    000000 019 CPY_0 4096 @0\n";
        let err = check_printdelta_output(dump, 4096).unwrap_err();
        assert!(matches!(err, TaketakeError::XdeltaMismatch { .. }));
    }

    #[test]
    fn rejects_more_than_one_instruction() {
        let dump = "VCDIFF copy window length:   4096\n\
                    VCDIFF copy window offset:   0\n\
                    VCDIFF target window length: 4096\n\
                    VCDIFF data section length:  0\n\
                    000000 019 CPY_0 2048 @0\n\
                    000800 019 CPY_0 2048 @2048\n";
        let err = check_printdelta_output(dump, 4096).unwrap_err();
        assert!(matches!(err, TaketakeError::XdeltaMismatch { .. }));
    }

    #[test]
    fn rejects_missing_header_field() {
        let dump = "VCDIFF copy window length:   4096\n\
                    VCDIFF target window length: 4096\n\
                    VCDIFF data section length:  0\n\
                    000000 019 CPY_0 4096 @0\n";
        let err = check_printdelta_output(dump, 4096).unwrap_err();
        assert!(matches!(err, TaketakeError::XdeltaMismatch { .. }));
    }
}
