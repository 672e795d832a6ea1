//! Thin wrappers around [`std::fs`] that attach the path to the error
//! instead of returning a bare [`std::io::Error`], plus an atomic
//! write-then-rename helper used by [`ca_cache`](../ca_cache/index.html) and
//! the results writer.

use ca_error::{AnalysisResult, ErrContext};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

pub fn canonicalize<P: AsRef<Path>>(path: P) -> AnalysisResult<PathBuf> {
    let path = path.as_ref();
    std::fs::canonicalize(path).with_path(path)
}

pub fn create_dir_all<P: AsRef<Path>>(path: P) -> AnalysisResult<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).with_path(path)
}

pub fn read_to_string<P: AsRef<Path>>(path: P) -> AnalysisResult<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).with_path(path)
}

pub fn read<P: AsRef<Path>>(path: P) -> AnalysisResult<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).with_path(path)
}

pub fn metadata<P: AsRef<Path>>(path: P) -> AnalysisResult<Metadata> {
    let path = path.as_ref();
    std::fs::metadata(path).with_path(path)
}

pub fn remove_dir_all<P: AsRef<Path>>(path: P) -> AnalysisResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(path).with_path(path)
}

/// Writes `contents` to `path` atomically: the bytes land in a sibling
/// `<name>.tmp-<pid>` file first, then `rename`d into place. A rename within
/// the same directory is atomic on every filesystem this tool targets, so
/// concurrent readers always observe either the old or the fully-written new
/// content, never a partial write (§4.2's "readers always see a committed
/// value via rename-into-place").
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> AnalysisResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(format!(
        "tmp-{}",
        std::process::id().wrapping_add(tmp_suffix())
    ));
    std::fs::write(&tmp_path, contents).with_path(&tmp_path)?;
    std::fs::rename(&tmp_path, path).with_path(path)?;
    Ok(())
}

// A cheap, allocation-free source of extra entropy so two threads racing to
// write the same cache key don't collide on the same tmp file name; actual
// uniqueness doesn't matter, only that the last rename wins (§4.2).
fn tmp_suffix() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
