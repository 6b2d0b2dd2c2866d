//! Well-known formloop locations.
//!
//! Everything lives under `FORMLOOP_HOME` (default `.formloop` relative to the
//! working directory): `config.toml`, `cache/` and `sessions/`.

use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Resolution order:
/// 1) thread-local override (tests only)
/// 2) env `FORMLOOP_HOME`
/// 3) `.formloop` in the current directory
#[must_use]
pub fn formloop_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("FORMLOOP_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".formloop")
}

/// Returns `<FORMLOOP_HOME>/cache`
#[must_use]
pub fn cache_dir() -> Utf8PathBuf {
    formloop_home().join("cache")
}

/// Returns `<FORMLOOP_HOME>/sessions`
#[must_use]
pub fn sessions_dir() -> Utf8PathBuf {
    formloop_home().join("sessions")
}

/// Session ids become file names, so only `[A-Za-z0-9_-]` is accepted.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Returns `<dir>/<session_id>.json`
#[must_use]
pub fn snapshot_path(dir: &Utf8Path, session_id: &str) -> Utf8PathBuf {
    dir.join(format!("{session_id}.json"))
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: point `formloop_home()` at a fresh temp dir for this thread.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}
