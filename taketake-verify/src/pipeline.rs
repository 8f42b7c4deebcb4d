//! Drives the FLAC-decode-into-delta-encode pipeline and the printdelta
//! dump used to verify it (spec §4.4).

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use taketake_common::defaults::{PRINTDELTA_EXIT_GRACE_MS, XDELTA_MIN_FILE_SIZE};
use taketake_common::TaketakeError;
use taketake_proc::registry::{FLAC_DECODE_STDOUT, XDELTA_ENCODE_FROM_SOURCE, XDELTA_PRINTDELTA};
use taketake_proc::render;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::predicate::check_printdelta_output;

/// Decode `flac_path` to raw audio and delta-encode it against
/// `source_wav`, writing the result to `xd_path`. The two children are
/// connected by an OS pipe; only their stderr is captured in-process.
pub async fn encode_delta(flac_path: &Path, source_wav: &Path, xd_path: &Path) -> Result<(), TaketakeError> {
    let mut decode_params = HashMap::new();
    decode_params.insert("flac_path", flac_path.to_string_lossy().into_owned());
    let decode_argv = render(&FLAC_DECODE_STDOUT, &decode_params);

    let mut encode_params = HashMap::new();
    encode_params.insert("source_wav", source_wav.to_string_lossy().into_owned());
    let encode_argv = render(&XDELTA_ENCODE_FROM_SOURCE, &encode_params);

    debug!(?decode_argv, ?encode_argv, xd = %xd_path.display(), "starting decode-into-delta pipeline");

    let mut decoder = Command::new(&decode_argv[0])
        .args(&decode_argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let decoder_stdout = decoder.stdout.take().expect("stdout was piped");
    let decoder_stdin_for_encoder: Stdio = decoder_stdout.try_into()?;

    let out_file = std::fs::File::create(xd_path)?;

    let mut encoder = Command::new(&encode_argv[0])
        .args(&encode_argv[1..])
        .stdin(decoder_stdin_for_encoder)
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::piped())
        .spawn()?;

    let mut decoder_stderr = decoder.stderr.take().expect("stderr was piped");
    let mut encoder_stderr = encoder.stderr.take().expect("stderr was piped");
    let (decoder_stderr, encoder_stderr, decoder_status, encoder_status) = tokio::join!(
        read_to_string(&mut decoder_stderr),
        read_to_string(&mut encoder_stderr),
        decoder.wait(),
        encoder.wait(),
    );

    let decoder_status = decoder_status?;
    if !decoder_status.success() {
        return Err(TaketakeError::SubprocessError {
            command: decode_argv[0].clone(),
            status: decoder_status.code(),
            stderr: decoder_stderr,
        });
    }
    let encoder_status = encoder_status?;
    if !encoder_status.success() {
        return Err(TaketakeError::SubprocessError {
            command: encode_argv[0].clone(),
            status: encoder_status.code(),
            stderr: encoder_stderr,
        });
    }
    Ok(())
}

async fn read_to_string(pipe: &mut (impl tokio::io::AsyncRead + Unpin)) -> String {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Run the delta tool's `printdelta` dump over `xd_path`, honoring
/// `cancel`: if the cancellation token fires while the child is still
/// running, wait [`PRINTDELTA_EXIT_GRACE_MS`] for it to exit on its own
/// before sending a kill, avoiding the host's "unknown child PID" warning
/// race (spec §5).
pub async fn run_printdelta(xd_path: &Path, cancel: &CancellationToken) -> Result<String, TaketakeError> {
    let mut params = HashMap::new();
    params.insert("xd_path", xd_path.to_string_lossy().into_owned());
    let argv = render(&XDELTA_PRINTDELTA, &params);

    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    tokio::select! {
        status = child.wait() => {
            finish(&argv[0], child, status?).await
        }
        _ = cancel.cancelled() => {
            tokio::time::sleep(std::time::Duration::from_millis(PRINTDELTA_EXIT_GRACE_MS)).await;
            match child.try_wait()? {
                Some(status) => finish(&argv[0], child, status).await,
                None => {
                    warn!(command = %argv[0], "killing printdelta after cancellation grace period");
                    child.kill().await?;
                    Err(TaketakeError::SubprocessError {
                        command: argv[0].clone(),
                        status: None,
                        stderr: "cancelled".to_string(),
                    })
                }
            }
        }
    }
}

async fn finish(
    command: &str,
    mut child: tokio::process::Child,
    status: std::process::ExitStatus,
) -> Result<String, TaketakeError> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut s) = child.stdout.take() {
        stdout = read_to_string(&mut s).await;
    }
    if let Some(mut s) = child.stderr.take() {
        stderr = read_to_string(&mut s).await;
    }
    if !status.success() {
        return Err(TaketakeError::SubprocessError {
            command: command.to_string(),
            status: status.code(),
            stderr,
        });
    }
    if !stderr.is_empty() {
        return Err(TaketakeError::XdeltaMismatch {
            offending_line: stderr.lines().next().unwrap_or("non-empty stderr").to_string(),
        });
    }
    Ok(stdout)
}

/// Full verification: delta-encode, then check the printdelta predicate
/// (spec §4.4, testable property 5). `source_size` and `target_size` are
/// the independently-measured sizes of the original WAV and the decoded
/// FLAC stream.
pub async fn verify_byte_identical(
    xd_path: &Path,
    source_size: u64,
    target_size: u64,
    cancel: &CancellationToken,
) -> Result<(), TaketakeError> {
    if source_size < XDELTA_MIN_FILE_SIZE || target_size < XDELTA_MIN_FILE_SIZE {
        return Err(TaketakeError::XdeltaMismatch {
            offending_line: format!(
                "file size below the delta tool's {XDELTA_MIN_FILE_SIZE}-byte minimum (source {source_size}, target {target_size})"
            ),
        });
    }
    if source_size != target_size {
        return Err(TaketakeError::XdeltaMismatch {
            offending_line: format!("source size {source_size} != target size {target_size}"),
        });
    }

    let stdout = run_printdelta(xd_path, cancel).await?;
    check_printdelta_output(&stdout, source_size)
}
