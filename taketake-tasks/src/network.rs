//! Builds the step network wiring exactly as spec.md §4.2 describes it:
//! `setup → listen → reorder → autoname → prompt → pargen → cleanup`, with
//! the parallel `flacenc → {pargen, xdelta} → cleanup` branch. `flacenc`
//! forwards its end-token as a barrier into `xdelta`'s presync; `xdelta`
//! forwards its own end-token as a barrier into `cleanup`'s presync.

use taketake_common::TaketakeError;
use taketake_stepnet::{Network, NetworkBuilder, StepId};

/// One [`StepId`] per step task, for the orchestrator to build
/// [`taketake_stepnet::StepperHandle`]s from.
pub struct StepIds {
    pub setup: StepId,
    pub listen: StepId,
    pub reorder: StepId,
    pub autoname: StepId,
    pub prompt: StepId,
    pub flacenc: StepId,
    pub xdelta: StepId,
    pub pargen: StepId,
    pub cleanup: StepId,
}

pub fn build() -> Result<(Network, StepIds), TaketakeError> {
    let mut b = NetworkBuilder::new();

    let q_setup_listen = b.data_queue("setup->listen");
    let q_setup_flacenc = b.data_queue("setup->flacenc");
    let q_listen_reorder = b.data_queue("listen->reorder");
    let q_reorder_autoname = b.data_queue("reorder->autoname");
    let q_autoname_prompt = b.data_queue("autoname->prompt");
    let q_prompt_pargen = b.data_queue("prompt->pargen");
    let q_flacenc_pargen = b.data_queue("flacenc->pargen");
    let q_flacenc_xdelta = b.data_queue("flacenc->xdelta");
    let q_pargen_cleanup = b.data_queue("pargen->cleanup");
    let q_flacenc_xdelta_sync = b.sync_queue("flacenc->xdelta.sync");
    let q_xdelta_cleanup_sync = b.sync_queue("xdelta->cleanup.sync");

    let setup = b.add("setup", &[], &[q_setup_listen, q_setup_flacenc], &[], &[])?;
    let listen = b.add("listen", &[q_setup_listen], &[q_listen_reorder], &[], &[])?;
    let reorder = b.add("reorder", &[q_listen_reorder], &[q_reorder_autoname], &[], &[])?;
    let autoname = b.add("autoname", &[q_reorder_autoname], &[q_autoname_prompt], &[], &[])?;
    let prompt = b.add("prompt", &[q_autoname_prompt], &[q_prompt_pargen], &[], &[])?;
    let flacenc = b.add(
        "flacenc",
        &[q_setup_flacenc],
        &[q_flacenc_pargen, q_flacenc_xdelta],
        &[],
        &[q_flacenc_xdelta_sync],
    )?;
    let xdelta = b.add(
        "xdelta",
        &[q_flacenc_xdelta],
        &[],
        &[q_flacenc_xdelta_sync],
        &[q_xdelta_cleanup_sync],
    )?;
    let pargen = b.add(
        "pargen",
        &[q_prompt_pargen, q_flacenc_pargen],
        &[q_pargen_cleanup],
        &[],
        &[],
    )?;
    let cleanup = b.add(
        "cleanup",
        &[q_pargen_cleanup],
        &[],
        &[q_xdelta_cleanup_sync],
        &[],
    )?;

    let net = b.build()?;
    Ok((
        net,
        StepIds {
            setup,
            listen,
            reorder,
            autoname,
            prompt,
            flacenc,
            xdelta,
            pargen,
            cleanup,
        },
    ))
}
