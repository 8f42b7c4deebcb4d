//! Default tunables, the same role the original `Config` class played
//! (`examples/original_source/src/taketake.py`). Kept as plain `const`
//! items rather than a mutable config object, the way the teacher keeps
//! shared constants at module scope (`whisperd::audio_segmenter::FRAME_SIZE`,
//! `whisperd::SEGMENTS_ENV`).

/// Number of concurrent speech-to-text workers (`listen`'s worker pool size).
pub const NUM_LISTENER_TASKS: usize = 6;

/// Silence threshold in dBFS; audio above this is not considered silence.
pub const SILENCE_THRESHOLD_DBFS: f64 = -55.0;

/// Silence shorter than this is not detected as a silent interval.
pub const SILENCE_MIN_DURATION_S: f64 = 0.5;

/// Default scan cap passed to the media analyzer (`-t` duration).
pub const FILE_SCAN_DURATION_S: f64 = 90.0;

/// Only non-silent intervals at least this long are candidate speech spans.
pub const MIN_TALK_DURATION_S: f64 = 2.5;

/// Cap on the widened span handed to the recognizer.
pub const MAX_TALK_DURATION_S: f64 = 15.0;

/// Widening applied to the start of the chosen span.
pub const TALK_ATTACK_S: f64 = 0.2;

/// Widening applied to the end of the chosen span.
pub const TALK_RELEASE_S: f64 = 0.2;

/// Tolerance used when comparing floating point offsets/durations.
pub const EPSILON_S: f64 = 0.01;

/// Disk-sector-aligned base unit for PAR2 block sizes.
pub const PAR2_BASE_BLOCKSIZE: u64 = 4096;

/// Upper bound on the number of PAR2 blocks a chosen block size should yield.
pub const PAR2_MAX_NUM_BLOCKS: u64 = 10_000;

/// Default filename prefix (`--prefix`).
pub const DEFAULT_PREFIX: &str = "piano";

/// Name of the sidecar file in a source directory carrying the instrument tag.
pub const INSTRUMENT_FNAME: &str = "instrmnt.txt";

/// Recognized source file extensions.
pub const WAV_EXTENSIONS: &[&str] = &["wav", "WAV"];

/// `strftime`-equivalent format for a datestamp with whole-minute precision.
pub const TIMESTAMP_FMT_NO_SECONDS: &str = "%Y%m%d-%H%M-%a";

/// `strftime`-equivalent format for a datestamp including seconds.
pub const TIMESTAMP_FMT_WITH_SECONDS: &str = "%Y%m%d-%H%M%S-%a";

/// Run directory name template: `.taketake.<YYYYMMDD-HHMMSS>.tmp`.
pub const PROGRESS_DIR_PREFIX: &str = ".taketake.";
pub const PROGRESS_DIR_SUFFIX: &str = ".tmp";

/// Symlink name pointing at the original source WAV.
pub const SOURCE_WAV_LINKNAME: &str = ".source.wav";

/// Template for rolled-back partial encodes: `.interrupted-abandoned.<ts>.flac`.
pub const INTERRUPTED_FLAC_PREFIX: &str = ".interrupted-abandoned.";
pub const INTERRUPTED_FLAC_SUFFIX: &str = ".flac";

pub const AUDIOINFO_FNAME: &str = ".audioinfo.json";
pub const GUESS_FNAME: &str = ".filename_guess";
pub const PROVIDED_FNAME: &str = ".filename_provided";
pub const XDELTA_FNAME: &str = ".xdelta";

/// Number of FEC volumes generated per archive (`-n`).
pub const DEFAULT_PAR2_VOLUMES: u32 = 2;

/// Redundancy percentage per volume set (`-r`).
pub const DEFAULT_PAR2_REDUNDANCY_PCT: u64 = 5;

/// Grace period the byte-delta verifier waits for the printer child to exit
/// on its own before requesting termination (spec §5).
pub const PRINTDELTA_EXIT_GRACE_MS: u64 = 2;

/// Files below this size are out of contract for the byte-delta verifier
/// (the delta tool inlines literal data instead of emitting a single copy).
pub const XDELTA_MIN_FILE_SIZE: u64 = 18;
