//! In-memory repository.
//!
//! This module provides a thread-safe in-memory implementation of the
//! Repository trait, used by tests and by embedders that keep state elsewhere.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::core::{AuditEntry, Proposal, ProposalDocument, SubmissionRequest};
use crate::error::{AgendaError, Result};
use crate::storage::batch::WriteBatch;
use crate::storage::state::RepositoryState;
use crate::storage::Repository;

/// In-memory repository.
///
/// Thread-safe implementation using `RwLock<RepositoryState>`. Readers see
/// either the pre- or post-commit state, never a partial batch.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<RepositoryState>,
}

impl MemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RepositoryState::new()),
        }
    }

    /// Create a repository seeded with existing state.
    pub fn with_state(state: RepositoryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> Result<RepositoryState> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RepositoryState>> {
        self.state
            .read()
            .map_err(|_| AgendaError::lock("repository read lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RepositoryState>> {
        self.state
            .write()
            .map_err(|_| AgendaError::lock("repository write lock poisoned"))
    }
}

impl Repository for MemoryRepository {
    fn proposal(&self, id: &str) -> Result<Option<Proposal>> {
        Ok(self.read()?.proposals.get(id).cloned())
    }

    fn proposals(&self) -> Result<Vec<Proposal>> {
        Ok(self.read()?.proposals.values().cloned().collect())
    }

    fn document(&self, id: &str) -> Result<Option<ProposalDocument>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    fn documents(&self) -> Result<Vec<ProposalDocument>> {
        Ok(self.read()?.documents.values().cloned().collect())
    }

    fn document_for_proposal(&self, proposal_id: &str) -> Result<Option<ProposalDocument>> {
        Ok(self
            .read()?
            .documents
            .values()
            .find(|d| d.proposal_id == proposal_id)
            .cloned())
    }

    fn request(&self, id: &str) -> Result<Option<SubmissionRequest>> {
        Ok(self.read()?.requests.get(id).cloned())
    }

    fn requests(&self) -> Result<Vec<SubmissionRequest>> {
        Ok(self.read()?.requests.values().cloned().collect())
    }

    fn audit_log(&self, document_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self
            .read()?
            .audit
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let writes = batch.len();
        self.write()?.apply(batch)?;
        debug!(writes, "Committed batch to memory repository");
        Ok(())
    }
}
