//! The `taketake` binary's CLI surface and run orchestration (spec §6). A
//! thin `main.rs` parses [`Cli`], installs tracing, and delegates to
//! [`run`], the same split every teacher binary (`distilld`, `whisperd`)
//! uses between its `main.rs` and `lib.rs`.

pub mod orchestrator;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use taketake_common::LogLevel;
use taketake_tasks::{FallbackTimestamp, TaskConfig};

/// Losslessly archive a set of piano recorder WAVs, verify them byte-exact,
/// and name them from their spoken intros.
#[derive(Parser, Debug)]
#[command(name = "taketake", version)]
pub struct Cli {
    /// One or more SOURCE_WAV files, plus a final DEST_PATH unless --target
    /// is given (in which case every positional is a source).
    #[arg(required = true, value_name = "SOURCE_WAV...  [DEST_PATH]")]
    pub paths: Vec<PathBuf>,

    /// Explicit destination directory, freeing all positionals to be sources.
    #[arg(long, value_name = "DEST_PATH")]
    pub target: Option<PathBuf>,

    /// Resume a previous run; must be a child of DEST_PATH.
    #[arg(long = "continue", value_name = "PROGRESS_DIR")]
    pub continue_dir: Option<PathBuf>,

    /// Suppress all filesystem mutations and user prompts.
    #[arg(long = "no-act")]
    pub no_act: bool,

    /// Verbose tracing, including the call site of aborting errors.
    #[arg(long)]
    pub debug: bool,

    /// Accept filename guesses without interaction.
    #[arg(long = "no-prompt")]
    pub no_prompt: bool,

    /// Filename prefix.
    #[arg(long, default_value = "piano")]
    pub prefix: String,

    /// Instrument tag; otherwise read from instrmnt.txt in the source directory.
    #[arg(long)]
    pub instrument: Option<String>,

    /// One of now|mtime|ctime|atime|<literal-timestamp>.
    #[arg(long = "fallback-timestamp", default_value = "now")]
    pub fallback_timestamp: String,

    /// Use the fallback timestamp for every file; never invoke the recognizer.
    #[arg(long = "skip-speech-to-text")]
    pub skip_speech_to_text: bool,

    /// Do not delete source files after verification.
    #[arg(long = "keep-wavs")]
    pub keep_wavs: bool,

    /// Do not copy the finished archive back to the source location.
    #[arg(long = "skip-copyback")]
    pub skip_copyback: bool,

    /// Do not run the in-process test pass at startup.
    #[arg(long = "skip-tests")]
    pub skip_tests: bool,

    /// Logging verbosity.
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// Sources, destination directory, and resume directory resolved from the
/// raw positional/`--target` surface (spec §6's CLI surface note).
pub struct ResolvedArgs {
    pub sources: Vec<PathBuf>,
    pub dest_dir: PathBuf,
    pub continue_dir: Option<PathBuf>,
}

/// An argument-validation failure (spec §6: exit code 2, distinct from a
/// runtime failure's exit code 1). `main` distinguishes the two by
/// downcasting the `anyhow::Error` chain to this type.
#[derive(Debug)]
pub struct ArgError(pub String);

impl std::fmt::Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgError {}

/// Split `cli.paths` into sources + destination, then validate `--continue`
/// is a child of the resolved destination. Argument-validation failures map
/// to exit code 2 (spec §6).
pub fn resolve_args(cli: &Cli) -> anyhow::Result<ResolvedArgs> {
    let (sources, dest_dir) = match &cli.target {
        Some(dest) => {
            if cli.paths.is_empty() {
                return Err(ArgError("at least one SOURCE_WAV is required".to_string()).into());
            }
            (cli.paths.clone(), dest.clone())
        }
        None => {
            if cli.paths.len() < 2 {
                return Err(ArgError(
                    "expected one or more SOURCE_WAV plus a final DEST_PATH".to_string(),
                )
                .into());
            }
            let mut paths = cli.paths.clone();
            let dest = paths.pop().expect("checked len >= 2 above");
            (paths, dest)
        }
    };

    if let Some(continue_dir) = &cli.continue_dir {
        if continue_dir.parent() != Some(dest_dir.as_path()) {
            return Err(ArgError(format!(
                "--continue {} must be a child of {}",
                continue_dir.display(),
                dest_dir.display()
            ))
            .into());
        }
    }

    Ok(ResolvedArgs {
        sources,
        dest_dir,
        continue_dir: cli.continue_dir.clone(),
    })
}

/// Resolve the `--instrument` tag: the flag if given, else `instrmnt.txt`
/// beside the first source WAV, else the empty string.
pub async fn resolve_instrument(cli: &Cli, first_source: &Path) -> String {
    if let Some(instrument) = &cli.instrument {
        return instrument.clone();
    }
    let sidecar = first_source
        .parent()
        .unwrap_or(Path::new("."))
        .join(taketake_common::defaults::INSTRUMENT_FNAME);
    match tokio::fs::read_to_string(&sidecar).await {
        Ok(contents) => contents.trim().to_string(),
        Err(_) => String::new(),
    }
}

pub fn build_task_config(cli: &Cli, instrument: String) -> anyhow::Result<TaskConfig> {
    let fallback_timestamp = FallbackTimestamp::parse(&cli.fallback_timestamp)
        .map_err(|e| ArgError(format!("--fallback-timestamp: {e}")))?;
    Ok(TaskConfig {
        act: !cli.no_act,
        prompt_enabled: !cli.no_prompt,
        prefix: cli.prefix.clone(),
        instrument,
        fallback_timestamp,
        skip_speech_to_text: cli.skip_speech_to_text,
        keep_wavs: cli.keep_wavs,
        skip_copyback: cli.skip_copyback,
    })
}

/// Run the full pipeline for one invocation of the binary.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let resolved = resolve_args(&cli)?;

    if !cli.skip_tests {
        orchestrator::preflight_external_tools().await?;
    }

    let instrument = match resolved.sources.first() {
        Some(first) => resolve_instrument(&cli, first).await,
        None => String::new(),
    };
    let config = build_task_config(&cli, instrument)?;

    let cache_flush: Rc<dyn taketake_common::CacheFlush> = if cli.no_act {
        Rc::new(taketake_common::NoopCacheFlush)
    } else {
        orchestrator::default_cache_flush()
    };

    orchestrator::run_pipeline(config, cache_flush, resolved).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(paths: &[&str], target: Option<&str>, continue_dir: Option<&str>) -> Cli {
        Cli {
            paths: paths.iter().map(PathBuf::from).collect(),
            target: target.map(PathBuf::from),
            continue_dir: continue_dir.map(PathBuf::from),
            no_act: false,
            debug: false,
            no_prompt: false,
            prefix: "piano".into(),
            instrument: None,
            fallback_timestamp: "now".into(),
            skip_speech_to_text: false,
            keep_wavs: false,
            skip_copyback: false,
            skip_tests: true,
            log_level: LogLevel::Info,
        }
    }

    #[test]
    fn last_positional_is_the_destination_without_target() {
        let resolved = resolve_args(&cli(&["/a.wav", "/b.wav", "/dest"], None, None)).unwrap();
        assert_eq!(resolved.sources, vec![PathBuf::from("/a.wav"), PathBuf::from("/b.wav")]);
        assert_eq!(resolved.dest_dir, PathBuf::from("/dest"));
    }

    #[test]
    fn target_frees_every_positional_to_be_a_source() {
        let resolved = resolve_args(&cli(&["/a.wav", "/b.wav"], Some("/dest"), None)).unwrap();
        assert_eq!(resolved.sources, vec![PathBuf::from("/a.wav"), PathBuf::from("/b.wav")]);
        assert_eq!(resolved.dest_dir, PathBuf::from("/dest"));
    }

    #[test]
    fn single_positional_without_target_is_rejected() {
        assert!(resolve_args(&cli(&["/a.wav"], None, None)).is_err());
    }

    #[test]
    fn continue_dir_must_be_a_child_of_dest() {
        let err = resolve_args(&cli(&["/a.wav", "/b.wav", "/dest"], None, Some("/other/run"))).unwrap_err();
        assert!(err.to_string().contains("must be a child of"));
    }

    #[test]
    fn continue_dir_as_a_child_of_dest_is_accepted() {
        let resolved =
            resolve_args(&cli(&["/a.wav", "/dest"], None, Some("/dest/.taketake.x.tmp"))).unwrap();
        assert_eq!(resolved.continue_dir, Some(PathBuf::from("/dest/.taketake.x.tmp")));
    }
}
