use std::collections::HashMap;

/// A named argv template: a program plus a fixed sequence of argument
/// segments, each of which may carry `{placeholder}` markers filled in at
/// call time. Replaces the original's metaclass-based command registry
/// (spec §9) with a compile-time declared table.
#[derive(Debug, Clone, Copy)]
pub struct ArgTemplate {
    pub name: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

/// Substitute every `{key}` occurrence in every argument segment of `tpl`
/// using `params`, returning the rendered argv (program first).
///
/// Panics (a template/params mismatch is a programming error, not a runtime
/// one) if a placeholder has no matching entry in `params`.
pub fn render(tpl: &ArgTemplate, params: &HashMap<&str, String>) -> Vec<String> {
    let mut argv = Vec::with_capacity(tpl.args.len() + 1);
    argv.push(tpl.program.to_string());
    for segment in tpl.args {
        argv.push(substitute(segment, params));
    }
    argv
}

fn substitute(segment: &str, params: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(segment.len());
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = segment[i..].find('}') {
                let key = &segment[i + 1..i + end];
                match params.get(key) {
                    Some(val) => out.push_str(val),
                    None => panic!("template `{segment}` missing parameter `{key}`"),
                }
                i += end + 1;
                continue;
            }
        }
        let ch = segment[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Registry of external tool invocations named in spec §6.
pub mod registry {
    use super::ArgTemplate;

    pub const SILENCE_DETECT: ArgTemplate = ArgTemplate {
        name: "silence_detect",
        program: "ffmpeg",
        args: &[
            "-i",
            "{path}",
            "-af",
            "silencedetect=noise={threshold_dbfs}dB:d={min_duration_s}",
            "-t",
            "{scan_duration_s}",
            "-f",
            "null",
            "-",
        ],
    };

    pub const DURATION_PROBE: ArgTemplate = ArgTemplate {
        name: "duration_probe",
        program: "ffprobe",
        args: &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            "{path}",
        ],
    };

    pub const FLAC_ENCODE: ArgTemplate = ArgTemplate {
        name: "flac_encode",
        program: "flac",
        args: &["--replay-gain", "--best", "-f", "-o", "{flac_path}", "{wav_path}"],
    };

    pub const FLAC_DECODE_STDOUT: ArgTemplate = ArgTemplate {
        name: "flac_decode_stdout",
        program: "flac",
        args: &["-d", "-s", "-c", "{flac_path}"],
    };

    pub const XDELTA_ENCODE_FROM_SOURCE: ArgTemplate = ArgTemplate {
        name: "xdelta_encode_from_source",
        program: "xdelta3",
        args: &["-e", "-f", "-s", "{source_wav}"],
    };

    pub const XDELTA_PRINTDELTA: ArgTemplate = ArgTemplate {
        name: "xdelta_printdelta",
        program: "xdelta3",
        args: &["printdelta", "{xd_path}"],
    };

    pub const PAR2_CREATE: ArgTemplate = ArgTemplate {
        name: "par2_create",
        program: "par2",
        args: &[
            "create",
            "-s{block_size}",
            "-r{redundancy_pct}",
            "-n{num_volumes}",
            "-u",
            "{path}",
        ],
    };

    pub const PAR2_VERIFY: ArgTemplate = ArgTemplate {
        name: "par2_verify",
        program: "par2",
        args: &["verify", "{par2_path}"],
    };

    pub const PAR2_REPAIR: ArgTemplate = ArgTemplate {
        name: "par2_repair",
        program: "par2",
        args: &["repair", "{par2_path}"],
    };

    pub const PLAYER_OSD: ArgTemplate = ArgTemplate {
        name: "player_osd",
        program: "mpv",
        args: &["--start={start_s}", "--osd-msg1={osd_text}", "{path}"],
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        let mut params = HashMap::new();
        params.insert("block_size", "12288".to_string());
        params.insert("redundancy_pct", "5".to_string());
        params.insert("num_volumes", "2".to_string());
        params.insert("path", "archive.flac".to_string());
        let argv = render(&registry::PAR2_CREATE, &params);
        assert_eq!(
            argv,
            vec![
                "par2", "create", "-s12288", "-r5", "-n2", "-u", "archive.flac",
            ]
        );
    }

    #[test]
    #[should_panic(expected = "missing parameter")]
    fn missing_parameter_panics() {
        let params = HashMap::new();
        let _ = render(&registry::DURATION_PROBE, &params);
    }
}
