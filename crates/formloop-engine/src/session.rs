//! Session bookkeeping: live handles by id, and suspended runs on disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use formloop_utils::atomic_write::write_file_atomic;
use formloop_utils::error::SessionError;
use formloop_utils::paths::{is_valid_session_id, snapshot_path};

use crate::handle::{RunHandle, RunSnapshot};

/// At most one live [`RunHandle`] per session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    runs: HashMap<String, RunHandle>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under its session id. An existing run with the same
    /// id is abandoned and returned.
    pub fn create(&mut self, handle: RunHandle) -> Option<RunHandle> {
        let id = handle.session_id().to_string();
        let previous = self.runs.insert(id.clone(), handle);
        if let Some(old) = &previous {
            warn!(session = %id, state = %old.state(), "Replacing existing run for session");
        }
        previous
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RunHandle> {
        self.runs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut RunHandle, SessionError> {
        self.runs
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    pub fn remove(&mut self, id: &str) -> Option<RunHandle> {
        self.runs.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// `<dir>/<session_id>.json` snapshots of suspended runs.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: Utf8PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        let dir = Utf8PathBuf::from_path_buf(dir).map_err(|p| SessionError::SnapshotWrite {
            path: p.display().to_string(),
            reason: "sessions directory is not valid UTF-8".to_string(),
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<Utf8PathBuf, SessionError> {
        if !is_valid_session_id(id) {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(snapshot_path(&self.dir, id))
    }

    pub fn save(&self, snapshot: &RunSnapshot) -> Result<Utf8PathBuf, SessionError> {
        let path = self.path_for(&snapshot.session_id)?;
        let write_err = |reason: String| SessionError::SnapshotWrite {
            path: path.to_string(),
            reason,
        };
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| write_err(e.to_string()))?;
        write_file_atomic(&path, &json).map_err(|e| write_err(format!("{e:#}")))?;
        debug!(session = %snapshot.session_id, path = %path, "Saved run snapshot");
        Ok(path)
    }

    pub fn load(&self, id: &str) -> Result<RunSnapshot, SessionError> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        let read_err = |reason: String| SessionError::SnapshotRead {
            path: path.to_string(),
            reason,
        };
        let json = std::fs::read_to_string(&path).map_err(|e| read_err(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| read_err(e.to_string()))
    }

    /// Remove a snapshot; a missing file is not an error.
    pub fn delete(&self, id: &str) -> Result<(), SessionError> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::SnapshotWrite {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
