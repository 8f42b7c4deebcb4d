//! Wires the step network to the task coroutines and drives one full run
//! (spec §4.1, §4.2, §5). The single `current_thread` runtime means every
//! step's `run` future is polled by one `tokio::try_join!`, not spawned.

use std::process::Stdio;
use std::rc::Rc;

use taketake_common::{CacheFlush, TaketakeError};
use taketake_progress::store::run_dir;
use taketake_stepnet::StepperHandle;
use taketake_tasks::context::{RunContext, TaskConfig};
use taketake_tasks::recognizer::NullRecognizer;
use tracing::info;

use crate::ResolvedArgs;

/// External programs every step invokes somewhere in the pipeline (spec
/// §6's "external tool invocations" list); `--skip-tests` skips this check.
const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "flac", "xdelta3", "par2", "mpv"];

/// Confirm each required external tool is invocable before doing any real
/// work, rather than failing deep inside the pipeline on the first file
/// that reaches `flacenc` or `pargen`.
pub async fn preflight_external_tools() -> anyhow::Result<()> {
    for tool in REQUIRED_TOOLS {
        tokio::process::Command::new(tool)
            .arg("-h")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| anyhow::anyhow!("required external tool `{tool}` is not available: {e}"))?;
    }
    Ok(())
}

#[cfg(unix)]
pub fn default_cache_flush() -> Rc<dyn CacheFlush> {
    Rc::new(taketake_common::cache_flush::PosixCacheFlush)
}

#[cfg(not(unix))]
pub fn default_cache_flush() -> Rc<dyn CacheFlush> {
    Rc::new(taketake_common::NoopCacheFlush)
}

/// Build the step network, hand every step its handle, and run the whole
/// pipeline to completion on the current-thread runtime.
pub async fn run_pipeline(
    config: TaskConfig,
    cache_flush: Rc<dyn CacheFlush>,
    resolved: ResolvedArgs,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&resolved.dest_dir).await?;

    let run_directory = match resolved.continue_dir {
        Some(dir) => dir,
        None => {
            let run_id = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
            run_dir(&resolved.dest_dir, &run_id)
        }
    };

    let (mut net, ids) = taketake_tasks::network::build()?;
    let mut h_setup = StepperHandle::new(&mut net, ids.setup);
    let mut h_listen = StepperHandle::new(&mut net, ids.listen);
    let mut h_reorder = StepperHandle::new(&mut net, ids.reorder);
    let mut h_autoname = StepperHandle::new(&mut net, ids.autoname);
    let mut h_prompt = StepperHandle::new(&mut net, ids.prompt);
    let mut h_flacenc = StepperHandle::new(&mut net, ids.flacenc);
    let mut h_xdelta = StepperHandle::new(&mut net, ids.xdelta);
    let mut h_pargen = StepperHandle::new(&mut net, ids.pargen);
    let mut h_cleanup = StepperHandle::new(&mut net, ids.cleanup);
    drop(net);

    let ctx = RunContext::new(config, cache_flush, Rc::new(NullRecognizer));

    info!(
        sources = resolved.sources.len(),
        dest = %resolved.dest_dir.display(),
        run_dir = %run_directory.display(),
        "starting run"
    );

    let result: Result<_, TaketakeError> = tokio::try_join!(
        taketake_tasks::setup::run(&mut h_setup, &ctx, &resolved.dest_dir, &run_directory, &resolved.sources),
        taketake_tasks::listen::run(&mut h_listen, &ctx),
        taketake_tasks::reorder::run(&mut h_reorder),
        taketake_tasks::autoname::run(&mut h_autoname, &ctx),
        taketake_tasks::prompt::run(&mut h_prompt, &ctx),
        taketake_tasks::flacenc::run(&mut h_flacenc, &ctx),
        taketake_tasks::xdelta::run(&mut h_xdelta, &ctx),
        taketake_tasks::pargen::run(&mut h_pargen, &ctx),
        taketake_tasks::cleanup::run(&mut h_cleanup, &ctx),
    );

    match result {
        Ok(_) => {
            info!(count = ctx.len(), "run complete");
            Ok(())
        }
        Err(err) => {
            ctx.cancel.cancel();
            Err(err.into())
        }
    }
}
