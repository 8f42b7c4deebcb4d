//! Shared run state threaded through every step task: the worklist (spec
//! §3), run configuration, and the pluggable collaborators (cache-flush,
//! recognizer). A single `current_thread` runtime drives the whole network
//! (spec §5), so the worklist is `Rc<RefCell<..>>` rather than `Arc<Mutex<..>>`
//! — cheaper, and correct because no step task is ever handed to
//! `tokio::spawn` (only `listen`'s per-recognition pipeline touches a
//! thread pool, via `spawn_blocking` inside the recognizer implementation,
//! and only ever on owned, serializable copies per spec §9's design note).

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Local, TimeZone};
use taketake_common::{CacheFlush, TaketakeError};
use taketake_grammar::parse_timestamp_literal;
use taketake_progress::WorklistEntry;
use taketake_stepnet::Token;

use crate::recognizer::Recognizer;

/// `--fallback-timestamp`: `now|mtime|ctime|atime|<literal>` (spec §6).
#[derive(Debug, Clone)]
pub enum FallbackTimestamp {
    Now,
    Mtime,
    Ctime,
    Atime,
    Literal(chrono::NaiveDateTime),
}

impl FallbackTimestamp {
    pub fn parse(raw: &str) -> Result<Self, TaketakeError> {
        match raw {
            "now" => Ok(Self::Now),
            "mtime" => Ok(Self::Mtime),
            "ctime" => Ok(Self::Ctime),
            "atime" => Ok(Self::Atime),
            literal => Ok(Self::Literal(parse_timestamp_literal(literal)?)),
        }
    }

    /// Resolve this policy against `source_wav`, consulting filesystem
    /// metadata only for the `mtime`/`ctime`/`atime` variants.
    pub async fn resolve(&self, source_wav: &Path) -> Result<DateTime<Local>, TaketakeError> {
        let system_time = match self {
            Self::Now => return Ok(Local::now()),
            Self::Literal(dt) => {
                return Ok(Local
                    .from_local_datetime(dt)
                    .single()
                    .unwrap_or_else(Local::now))
            }
            Self::Mtime => tokio::fs::metadata(source_wav).await?.modified()?,
            Self::Atime => tokio::fs::metadata(source_wav).await?.accessed()?,
            Self::Ctime => ctime(source_wav).await?,
        };
        Ok(DateTime::<Local>::from(system_time))
    }
}

#[cfg(unix)]
async fn ctime(path: &Path) -> Result<std::time::SystemTime, TaketakeError> {
    use std::os::unix::fs::MetadataExt;
    let meta = tokio::fs::metadata(path).await?;
    let secs = meta.ctime().max(0) as u64;
    Ok(std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs))
}

#[cfg(not(unix))]
async fn ctime(path: &Path) -> Result<std::time::SystemTime, TaketakeError> {
    tokio::fs::metadata(path).await?.modified().map_err(Into::into)
}

/// Run-wide configuration, assembled from the CLI in the `taketake` binary.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub act: bool,
    pub prompt_enabled: bool,
    pub prefix: String,
    pub instrument: String,
    pub fallback_timestamp: FallbackTimestamp,
    pub skip_speech_to_text: bool,
    pub keep_wavs: bool,
    pub skip_copyback: bool,
}

/// Shared run state: the worklist plus the collaborators every step task
/// needs. Constructed once by the orchestrator and borrowed by every task.
pub struct RunContext {
    worklist: Rc<RefCell<Vec<WorklistEntry>>>,
    pub config: Rc<TaskConfig>,
    pub cache_flush: Rc<dyn CacheFlush>,
    pub recognizer: Rc<dyn Recognizer>,
    /// Cancelled by the orchestrator the moment any step errors, so every
    /// in-flight `printdelta` child gets its 2ms grace exit instead of
    /// being force-killed (spec §5's cancellation note).
    pub cancel: tokio_util::sync::CancellationToken,
}

impl RunContext {
    pub fn new(
        config: TaskConfig,
        cache_flush: Rc<dyn CacheFlush>,
        recognizer: Rc<dyn Recognizer>,
    ) -> Self {
        Self {
            worklist: Rc::new(RefCell::new(Vec::new())),
            config: Rc::new(config),
            cache_flush,
            recognizer,
            cancel: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Append a new entry, returning the token `setup` hands downstream.
    pub fn push(&self, entry: WorklistEntry) -> Token {
        let mut worklist = self.worklist.borrow_mut();
        let index = worklist.len() as u64;
        worklist.push(entry);
        Token::new(index)
    }

    /// A cloned snapshot of `token`'s entry, safe to carry across a
    /// suspension point without holding the borrow open.
    pub fn snapshot(&self, token: Token) -> WorklistEntry {
        let idx = token.index().expect("snapshot called with the end-token");
        self.worklist.borrow()[idx].clone()
    }

    pub fn update<R>(&self, token: Token, f: impl FnOnce(&mut WorklistEntry) -> R) -> R {
        let idx = token.index().expect("update called with the end-token");
        let mut worklist = self.worklist.borrow_mut();
        f(&mut worklist[idx])
    }

    pub fn len(&self) -> usize {
        self.worklist.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_fallback_policies() {
        assert!(matches!(FallbackTimestamp::parse("now").unwrap(), FallbackTimestamp::Now));
        assert!(matches!(FallbackTimestamp::parse("mtime").unwrap(), FallbackTimestamp::Mtime));
    }

    #[test]
    fn parses_a_literal_fallback() {
        let fb = FallbackTimestamp::parse("20210519-1938").unwrap();
        assert!(matches!(fb, FallbackTimestamp::Literal(_)));
    }

    #[test]
    fn push_then_snapshot_round_trips() {
        let ctx = RunContext::new(
            TaskConfig {
                act: true,
                prompt_enabled: false,
                prefix: "piano".into(),
                instrument: "piano".into(),
                fallback_timestamp: FallbackTimestamp::Now,
                skip_speech_to_text: false,
                keep_wavs: false,
                skip_copyback: false,
            },
            Rc::new(taketake_common::NoopCacheFlush),
            Rc::new(crate::recognizer::NullRecognizer),
        );
        let entry = WorklistEntry::new("/a.wav".into(), "/dest".into(), "/dest/run/a".into());
        let token = ctx.push(entry.clone());
        assert_eq!(token.index(), Some(0));
        assert_eq!(ctx.snapshot(token).source_wav, entry.source_wav);
        assert_eq!(ctx.len(), 1);
    }
}
