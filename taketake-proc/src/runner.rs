use std::process::{ExitStatus, Stdio};

use taketake_common::TaketakeError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

/// A named process-result record with explicit fields, replacing the
/// original's dynamic attribute grafting onto the child process object
/// (spec §9).
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Turn a failed [`ProcessOutput`] into a [`TaketakeError::SubprocessError`],
/// naming the command and quoting its stderr.
pub fn check_status(command_name: &str, out: &ProcessOutput) -> Result<(), TaketakeError> {
    if out.success() {
        Ok(())
    } else {
        Err(TaketakeError::SubprocessError {
            command: command_name.to_string(),
            status: out.status.code(),
            stderr: out.stderr_string(),
        })
    }
}

fn build_command(argv: &[String]) -> Command {
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd
}

/// Spawn `argv`, await it to completion, and capture both stdout and
/// stderr. Used for single-shot invocations (duration probe, silence
/// detect, FLAC encode, PAR2 create/verify/repair).
pub async fn run(argv: &[String]) -> Result<ProcessOutput, TaketakeError> {
    debug!(argv = ?argv, "spawning subprocess");
    let output = build_command(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    trace!(status = ?output.status, "subprocess exited");
    Ok(ProcessOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        status: output.status,
    })
}

/// Spawn `argv` with piped stdin/stdout/stderr, returning the live child
/// for the caller to drive (used when two processes must be chained, as in
/// the byte-delta verifier's decode-then-diff pipeline).
pub fn spawn_piped(argv: &[String]) -> std::io::Result<Child> {
    debug!(argv = ?argv, "spawning piped subprocess");
    build_command(argv)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Write `input` to `child`'s stdin and close it, then collect stdout,
/// stderr, and the exit status. Drains stdout/stderr concurrently with
/// waiting so a child that fills its stderr pipe before reading all of
/// stdin cannot deadlock the pair.
pub async fn drive(mut child: Child, input: Option<&[u8]>) -> Result<ProcessOutput, TaketakeError> {
    let mut stdin = child.stdin.take();
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let input = input.map(|b| b.to_vec());
    let write_fut = async move {
        if let (Some(mut stdin), Some(input)) = (stdin.take(), input) {
            let _ = stdin.write_all(&input).await;
        }
    };
    let stdout_fut = async move {
        let mut buf = Vec::new();
        if let Some(mut s) = stdout.take() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    };
    let stderr_fut = async move {
        let mut buf = Vec::new();
        if let Some(mut s) = stderr.take() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    };

    let (_, stdout, stderr, status) =
        tokio::join!(write_fut, stdout_fut, stderr_fut, child.wait());
    let status = status?;
    Ok(ProcessOutput {
        stdout,
        stderr,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_and_status() {
        let argv = vec!["printf".to_string(), "hello".to_string()];
        let out = run(&argv).await.unwrap();
        assert_eq!(out.stdout_string(), "hello");
        assert!(out.success());
    }

    #[tokio::test]
    async fn drive_pipes_input_through_cat() {
        let child = spawn_piped(&["cat".to_string()]).unwrap();
        let out = drive(child, Some(b"piped data")).await.unwrap();
        assert_eq!(out.stdout_string(), "piped data");
        assert!(out.success());
    }
}
