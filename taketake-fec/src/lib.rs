//! FEC block-size policy and PAR2 driver (spec §4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use taketake_common::defaults::{
    DEFAULT_PAR2_REDUNDANCY_PCT, DEFAULT_PAR2_VOLUMES, PAR2_BASE_BLOCKSIZE, PAR2_MAX_NUM_BLOCKS,
};
use taketake_common::TaketakeError;
use taketake_proc::registry::{PAR2_CREATE, PAR2_REPAIR, PAR2_VERIFY};
use taketake_proc::{check_status, render, run};
use tracing::{debug, info};

/// Choose a PAR2 block size for a file of `source_size` bytes, `volumes`
/// equal-size PAR2 volumes at `redundancy_pct` percent redundancy each.
/// Bounds the total block count at roughly [`PAR2_MAX_NUM_BLOCKS`] while
/// keeping the block size a multiple of [`PAR2_BASE_BLOCKSIZE`] (spec
/// §4.5).
pub fn choose_block_size(source_size: u64, volumes: u32, redundancy_pct: u64) -> u64 {
    let total = source_size * volumes as u64 * redundancy_pct / 100;
    let min_block = total / PAR2_MAX_NUM_BLOCKS;
    let blocks = (min_block + PAR2_BASE_BLOCKSIZE - 1) / PAR2_BASE_BLOCKSIZE;
    blocks.max(1) * PAR2_BASE_BLOCKSIZE
}

/// Generate PAR2 recovery volumes for `path`, using [`choose_block_size`]
/// against `source_size`, then remove the redundant aggregate `.par2`
/// file PAR2 also writes (it duplicates the first volume, per spec §4.5).
pub async fn create_par2_volumes(path: &Path, source_size: u64) -> Result<(), TaketakeError> {
    create_par2_volumes_with(
        path,
        source_size,
        DEFAULT_PAR2_VOLUMES,
        DEFAULT_PAR2_REDUNDANCY_PCT,
    )
    .await
}

pub async fn create_par2_volumes_with(
    path: &Path,
    source_size: u64,
    volumes: u32,
    redundancy_pct: u64,
) -> Result<(), TaketakeError> {
    let block_size = choose_block_size(source_size, volumes, redundancy_pct);
    let mut params = HashMap::new();
    params.insert("path", path.to_string_lossy().into_owned());
    params.insert("block_size", block_size.to_string());
    params.insert("redundancy_pct", redundancy_pct.to_string());
    params.insert("num_volumes", volumes.to_string());

    let argv = render(&PAR2_CREATE, &params);
    debug!(?argv, block_size, "generating par2 volumes");
    let out = run(&argv).await?;
    check_status("par2 create", &out)?;

    let aggregate = aggregate_par2_path(path);
    if tokio::fs::try_exists(&aggregate).await? {
        tokio::fs::remove_file(&aggregate).await?;
        info!(path = %aggregate.display(), "removed redundant aggregate par2 file");
    }
    Ok(())
}

/// The aggregate `<path>.par2` file PAR2 writes alongside its numbered
/// volume set, redundant with `<path>.vol000+NNN.par2`.
pub fn aggregate_par2_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".par2");
    PathBuf::from(name)
}

pub async fn verify_par2(par2_path: &Path) -> Result<(), TaketakeError> {
    let mut params = HashMap::new();
    params.insert("par2_path", par2_path.to_string_lossy().into_owned());
    let argv = render(&PAR2_VERIFY, &params);
    let out = run(&argv).await?;
    check_status("par2 verify", &out)
}

pub async fn repair_par2(par2_path: &Path) -> Result<(), TaketakeError> {
    let mut params = HashMap::new();
    params.insert("par2_path", par2_path.to_string_lossy().into_owned());
    let argv = render(&PAR2_REPAIR, &params);
    let out = run(&argv).await?;
    check_status("par2 repair", &out)
}

/// Find a PAR2 file covering `stem` in `dir`: either the aggregate
/// `<stem>.par2` or the first `<stem>.vol*.par2` volume (spec's "Covering
/// PAR2" glossary entry). Returns `None` if resumed state has none,
/// signalling `pargen` must redo its work.
pub async fn find_covering_par2(dir: &Path, stem: &str) -> Result<Option<PathBuf>, TaketakeError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let aggregate_name = format!("{stem}.par2");
    let vol_prefix = format!("{stem}.vol");
    let mut found = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == aggregate_name {
            return Ok(Some(entry.path()));
        }
        if name.starts_with(&vol_prefix) && name.ends_with(".par2") && found.is_none() {
            found = Some(entry.path());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_one_gib_two_volumes_five_percent() {
        let block = choose_block_size(1024 * 1024 * 1024, 2, 5);
        assert_eq!(block, 12288);
    }

    #[test]
    fn block_size_has_a_floor_of_4096() {
        let block = choose_block_size(1000, 2, 5);
        assert_eq!(block, 4096);
    }

    #[test]
    fn block_size_is_always_a_multiple_of_4096() {
        for size in [1u64, 4095, 4097, 1_000_000, 5_000_000_000] {
            let block = choose_block_size(size, 2, 5);
            assert_eq!(block % PAR2_BASE_BLOCKSIZE, 0);
        }
    }

    #[tokio::test]
    async fn finds_the_aggregate_par2_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("song.flac.par2"), b"x").await.unwrap();
        let found = find_covering_par2(dir.path(), "song.flac").await.unwrap();
        assert_eq!(found, Some(dir.path().join("song.flac.par2")));
    }

    #[tokio::test]
    async fn finds_a_volume_file_when_the_aggregate_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("song.flac.vol000+002.par2"), b"x")
            .await
            .unwrap();
        let found = find_covering_par2(dir.path(), "song.flac").await.unwrap();
        assert_eq!(found, Some(dir.path().join("song.flac.vol000+002.par2")));
    }

    #[tokio::test]
    async fn missing_par2_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_covering_par2(dir.path(), "song.flac").await.unwrap();
        assert_eq!(found, None);
    }
}
