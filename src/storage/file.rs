//! File-based repository.
//!
//! The whole state is stored as one JSON snapshot, by default
//! `~/.agenda/state.json`. Atomic writes are achieved via temp file + rename,
//! so a crash mid-commit leaves the previous snapshot intact.
//!
//! Commits from any number of processes are serialized by an exclusive lock on
//! a sidecar `.state.json.lock` file, held across load, apply and write.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::Config;
use crate::core::{AuditEntry, Proposal, ProposalDocument, SubmissionRequest};
use crate::error::{AgendaError, Result};
use crate::storage::batch::WriteBatch;
use crate::storage::state::RepositoryState;
use crate::storage::Repository;

/// File-based repository.
///
/// Commits take the lock file, then load, apply and write. Reads load the
/// latest snapshot from disk without locking; the rename makes them see either
/// the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileRepository {
    /// Path of the JSON snapshot.
    path: PathBuf,
}

impl FileRepository {
    /// Create a file repository at the path the configuration resolves.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.state_file().ok_or_else(|| {
            AgendaError::config("Could not determine state file (no home directory)")
        })?;
        Self::with_path(path)
    }

    /// Create a file repository at a custom path.
    ///
    /// The parent directory is created if missing; the file itself is created
    /// by the first commit.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| AgendaError::storage(parent, e))?;
            }
        }

        Ok(Self { path })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the snapshot, its lock file and temp files.
    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Get the path of the sidecar lock file.
    fn lock_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        self.path.with_file_name(format!(".{}.lock", name))
    }

    /// Open the lock file and block until the exclusive lock is held.
    /// The lock is released when the returned file is dropped.
    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| AgendaError::storage(&lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| AgendaError::storage(&lock_path, e))?;
        Ok(file)
    }

    /// Load the current snapshot, or an empty state if none exists yet.
    pub fn load(&self) -> Result<RepositoryState> {
        if !self.path.exists() {
            return Ok(RepositoryState::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| AgendaError::storage(&self.path, e))?;
        let state: RepositoryState = serde_json::from_str(&content)?;
        Ok(state)
    }

    /// Write a snapshot atomically using a uniquely named temp file + rename.
    fn atomic_write(&self, state: &RepositoryState) -> Result<()> {
        let dir = self.dir();
        let json = serde_json::to_string_pretty(state)?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| AgendaError::storage(dir, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| AgendaError::storage(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| AgendaError::storage(temp.path(), e))?;

        // Rename temp file to final path (atomic on POSIX)
        temp.persist(&self.path)
            .map_err(|e| AgendaError::storage(&self.path, e.error))?;

        Ok(())
    }
}

impl Repository for FileRepository {
    fn proposal(&self, id: &str) -> Result<Option<Proposal>> {
        Ok(self.load()?.proposals.remove(id))
    }

    fn proposals(&self) -> Result<Vec<Proposal>> {
        Ok(self.load()?.proposals.into_values().collect())
    }

    fn document(&self, id: &str) -> Result<Option<ProposalDocument>> {
        Ok(self.load()?.documents.remove(id))
    }

    fn documents(&self) -> Result<Vec<ProposalDocument>> {
        Ok(self.load()?.documents.into_values().collect())
    }

    fn request(&self, id: &str) -> Result<Option<SubmissionRequest>> {
        Ok(self.load()?.requests.remove(id))
    }

    fn requests(&self) -> Result<Vec<SubmissionRequest>> {
        Ok(self.load()?.requests.into_values().collect())
    }

    fn audit_log(&self, document_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self.load()?.audit.remove(document_id).unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _lock = self.acquire_lock()?;

        let writes = batch.len();
        let mut state = self.load()?;
        state.apply(batch)?;
        self.atomic_write(&state)?;

        debug!(writes, path = %self.path.display(), "Committed batch to state file");
        Ok(())
    }
}
