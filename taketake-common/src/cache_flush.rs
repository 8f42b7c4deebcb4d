use std::path::Path;

use crate::error::Result;

/// Filesystem-cache flush, invoked before final verification so the
/// byte-delta check reads the archive back from disk rather than from the
/// page cache. Modeled as a trait with a no-op default so platforms without
/// the advisory (or tests) can swap in a stub, per spec §9's design note.
pub trait CacheFlush: Send + Sync {
    fn flush(&self, path: &Path) -> Result<()>;
}

/// Default on platforms with no advisory available.
pub struct NoopCacheFlush;

impl CacheFlush for NoopCacheFlush {
    fn flush(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
pub struct PosixCacheFlush;

#[cfg(unix)]
impl CacheFlush for PosixCacheFlush {
    fn flush(&self, path: &Path) -> Result<()> {
        use std::os::unix::io::AsRawFd;

        let file = std::fs::File::open(path)?;
        // SAFETY: `file` stays alive for the duration of the syscall; the fd
        // is valid and owned by `file`.
        let rc = unsafe { libc::fsync(file.as_raw_fd()) };
        if rc != 0 {
            return Err(crate::error::TaketakeError::Io(
                std::io::Error::last_os_error(),
            ));
        }
        // Drop this file's pages from the page cache so the next read comes
        // from disk.
        let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
        if rc != 0 {
            return Err(crate::error::TaketakeError::Io(
                std::io::Error::from_raw_os_error(rc),
            ));
        }
        Ok(())
    }
}
