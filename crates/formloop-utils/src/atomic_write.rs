//! Atomic file and directory publication.
//!
//! Files are written to a temporary sibling, fsynced, then renamed over the
//! target. Directories are staged under the destination's parent and renamed
//! into place as a whole, so readers see either nothing or a complete entry.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Bytes written to the target
    pub bytes_written: usize,
    /// Whether cross-filesystem fallback was used
    pub used_cross_filesystem_fallback: bool,
}

/// Outcome of publishing a staged directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The staged directory now lives at the target path.
    Published,
    /// Another writer published the target first; the staged copy was discarded.
    AlreadyPresent,
}

/// Atomically write UTF-8 text, normalizing line endings to LF.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    write_bytes_atomic(path, normalize_line_endings(content).as_bytes())
}

/// Atomically write raw bytes using temp file + fsync + rename.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<AtomicWriteResult> {
    let mut result = AtomicWriteResult {
        bytes_written: content.len(),
        ..AtomicWriteResult::default()
    };

    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;
    temp_file
        .write_all(content)
        .with_context(|| "Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    let temp_path = temp_file.path().to_path_buf();

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(e) if is_cross_filesystem_error(&e.error) => {
            result.used_cross_filesystem_fallback = true;
            cross_filesystem_copy_from_path(&temp_path, path)?;
        }
        Err(e) => {
            return Err(anyhow::anyhow!(e.error))
                .with_context(|| format!("Failed to atomically write file: {path}"));
        }
    }

    Ok(result)
}

/// Move a fully-built staging directory to `target` in one rename.
///
/// The staging directory must live on the same filesystem as `target`
/// (create it with `tempfile::TempDir::new_in(target_parent)`). If `target`
/// is already a directory the staged copy is removed and
/// [`PublishOutcome::AlreadyPresent`] is returned. On error the staged copy
/// is left for the caller to clean up.
pub fn publish_dir_atomic(staging: &Path, target: &Path) -> Result<PublishOutcome> {
    if target.is_dir() {
        let _ = fs::remove_dir_all(staging);
        return Ok(PublishOutcome::AlreadyPresent);
    }
    rename_staged(staging, target)
}

/// The rename half of [`publish_dir_atomic`]. A failed rename onto a target
/// that exists by then means a concurrent publisher got there first.
fn rename_staged(staging: &Path, target: &Path) -> Result<PublishOutcome> {
    match fs::rename(staging, target) {
        Ok(()) => Ok(PublishOutcome::Published),
        Err(_) if target.is_dir() => {
            let _ = fs::remove_dir_all(staging);
            Ok(PublishOutcome::AlreadyPresent)
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Failed to publish {} to {}",
                staging.display(),
                target.display()
            )
        }),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    // EXDEV on Linux/macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

/// copy→fsync→replace when the temp file ended up on another device
fn cross_filesystem_copy_from_path(temp_path: &Path, target: &Utf8Path) -> Result<()> {
    let content = fs::read(temp_path)
        .with_context(|| "Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("Failed to create temp file in target directory: {target_dir}"))?;
    target_temp
        .write_all(&content)
        .with_context(|| "Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| "Failed to persist during cross-filesystem copy")?;

    let _ = fs::remove_file(temp_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir, rel: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn test_write_creates_parents_and_normalizes() {
        let temp_dir = TempDir::new().unwrap();
        let path = utf8(&temp_dir, "sessions/nested/run.json");

        let result = write_file_atomic(&path, "a\r\nb\rc").unwrap();
        assert!(!result.used_cross_filesystem_fallback);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc");
    }

    #[test]
    fn test_write_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = utf8(&temp_dir, "snapshot.json");

        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_write_bytes_preserves_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = utf8(&temp_dir, "index.bin");
        let bytes = [0u8, 13, 10, 255];

        let result = write_bytes_atomic(&path, &bytes).unwrap();
        assert_eq!(result.bytes_written, 4);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_publish_dir_moves_staging() {
        let root = TempDir::new().unwrap();
        let staging = TempDir::new_in(root.path()).unwrap().keep();
        fs::write(staging.join("index.json"), "{}").unwrap();
        let target = root.path().join("abc");

        let outcome = publish_dir_atomic(&staging, &target).unwrap();
        assert_eq!(outcome, PublishOutcome::Published);
        assert!(target.join("index.json").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_publish_dir_keeps_existing_target() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("abc");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("index.json"), "original").unwrap();

        let staging = TempDir::new_in(root.path()).unwrap().keep();
        fs::write(staging.join("index.json"), "duplicate").unwrap();

        let outcome = publish_dir_atomic(&staging, &target).unwrap();
        assert_eq!(outcome, PublishOutcome::AlreadyPresent);
        assert_eq!(
            fs::read_to_string(target.join("index.json")).unwrap(),
            "original"
        );
        assert!(!staging.exists());
    }

    #[test]
    fn test_rename_onto_populated_target_is_already_present() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("abc");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("index.json"), "winner").unwrap();

        let staging = TempDir::new_in(root.path()).unwrap().keep();
        fs::write(staging.join("index.json"), "loser").unwrap();

        // Skips the existence pre-check, as when another writer renames
        // between the check and our rename.
        let outcome = rename_staged(&staging, &target).unwrap();
        assert_eq!(outcome, PublishOutcome::AlreadyPresent);
        assert_eq!(
            fs::read_to_string(target.join("index.json")).unwrap(),
            "winner"
        );
        assert!(!staging.exists());
    }

    #[test]
    fn test_rename_failure_leaves_staging_in_place() {
        let root = TempDir::new().unwrap();
        let staging = TempDir::new_in(root.path()).unwrap();
        fs::write(staging.path().join("index.json"), "{}").unwrap();
        let target = root.path().join("missing-parent").join("abc");

        assert!(publish_dir_atomic(staging.path(), &target).is_err());
        assert!(staging.path().join("index.json").exists());
    }
}
