//! Repository trait for the agenda workflow.
//!
//! This module defines the `Repository` trait that every workflow component
//! reads from and commits to.

use std::sync::Arc;

use crate::core::{AuditEntry, Proposal, ProposalDocument, SubmissionRequest};
use crate::error::Result;
use crate::storage::batch::WriteBatch;

/// Trait for transactional storage backends.
///
/// Reads return snapshots. Writes go through [`Repository::commit`], which
/// applies a whole [`WriteBatch`] or nothing.
pub trait Repository: Send + Sync {
    /// Retrieve a proposal by id.
    ///
    /// Returns `Ok(None)` if the proposal doesn't exist.
    fn proposal(&self, id: &str) -> Result<Option<Proposal>>;

    /// All proposals.
    fn proposals(&self) -> Result<Vec<Proposal>>;

    /// Retrieve a document by id.
    fn document(&self, id: &str) -> Result<Option<ProposalDocument>>;

    /// All documents.
    fn documents(&self) -> Result<Vec<ProposalDocument>>;

    /// The document generated from a proposal, if any.
    fn document_for_proposal(&self, proposal_id: &str) -> Result<Option<ProposalDocument>> {
        Ok(self
            .documents()?
            .into_iter()
            .find(|d| d.proposal_id == proposal_id))
    }

    /// Retrieve a submission request by id.
    fn request(&self, id: &str) -> Result<Option<SubmissionRequest>>;

    /// All submission requests.
    fn requests(&self) -> Result<Vec<SubmissionRequest>>;

    /// A document's audit log in sequence order.
    fn audit_log(&self, document_id: &str) -> Result<Vec<AuditEntry>>;

    /// Apply a batch atomically.
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Blanket implementation of Repository for Arc-wrapped repositories.
///
/// This allows sharing one repository between the workflow components and
/// across threads.
impl<T: Repository + ?Sized> Repository for Arc<T> {
    fn proposal(&self, id: &str) -> Result<Option<Proposal>> {
        (**self).proposal(id)
    }

    fn proposals(&self) -> Result<Vec<Proposal>> {
        (**self).proposals()
    }

    fn document(&self, id: &str) -> Result<Option<ProposalDocument>> {
        (**self).document(id)
    }

    fn documents(&self) -> Result<Vec<ProposalDocument>> {
        (**self).documents()
    }

    fn document_for_proposal(&self, proposal_id: &str) -> Result<Option<ProposalDocument>> {
        (**self).document_for_proposal(proposal_id)
    }

    fn request(&self, id: &str) -> Result<Option<SubmissionRequest>> {
        (**self).request(id)
    }

    fn requests(&self) -> Result<Vec<SubmissionRequest>> {
        (**self).requests()
    }

    fn audit_log(&self, document_id: &str) -> Result<Vec<AuditEntry>> {
        (**self).audit_log(document_id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }
}

/// Test utilities for Repository implementations.
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::core::{
        Actor, AuditAction, CommentAnalysis, NarrativeSections, NewProposal, SubmissionStatus,
        VoteAnalysis,
    };
    use crate::error::AgendaError;

    fn actor() -> Actor {
        Actor::new("u-7", "Preparer", 7)
    }

    /// Test helper to verify commit and read paths of a Repository.
    pub fn test_repository_roundtrip<R: Repository>(repo: &R) {
        let mut proposal = Proposal::new(NewProposal {
            id: "P1".to_string(),
            content: "Install hand rails in corridor B".to_string(),
            author_id: "u-1".to_string(),
            author_name: "Mori".to_string(),
            department: "Nursing".to_string(),
            facility: "Central".to_string(),
        });

        // Initially absent
        assert!(repo.proposal("P1").unwrap().is_none());
        assert!(repo.document_for_proposal("P1").unwrap().is_none());

        let mut doc = ProposalDocument::new(
            "P1",
            "Hand rails",
            NarrativeSections::default(),
            VoteAnalysis::default(),
            CommentAnalysis::default(),
            actor(),
        );
        let mut batch = WriteBatch::new();
        batch.put_proposal(&mut proposal);
        batch.put_document(&mut doc);
        batch.audit(&doc.id, &actor(), AuditAction::DocumentCreated, "generated");
        repo.commit(batch).unwrap();

        let stored = repo.proposal("P1").unwrap().unwrap();
        assert_eq!(stored, proposal);
        assert_eq!(repo.proposals().unwrap().len(), 1);

        let found = repo.document_for_proposal("P1").unwrap().unwrap();
        assert_eq!(found.id, doc.id);
        assert_eq!(repo.document(&doc.id).unwrap().unwrap().version, 1);
        assert_eq!(repo.documents().unwrap().len(), 1);

        let log = repo.audit_log(&doc.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, AuditAction::DocumentCreated);
        assert!(repo.audit_log("doc_none").unwrap().is_empty());

        let mut request = SubmissionRequest::new(&doc.id, &doc.title, "P1", "運営委員会", actor());
        let mut batch = WriteBatch::new();
        batch.put_request(&mut request);
        repo.commit(batch).unwrap();

        let stored = repo.request(&request.id).unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Pending);
        assert_eq!(repo.requests().unwrap().len(), 1);
    }

    /// Test helper to verify a failed commit leaves the repository untouched.
    pub fn test_repository_rejects_stale_batch<R: Repository>(repo: &R) {
        let mut doc = ProposalDocument::new(
            "P2",
            "Title",
            NarrativeSections::default(),
            VoteAnalysis::default(),
            CommentAnalysis::default(),
            actor(),
        );
        let mut batch = WriteBatch::new();
        batch.put_document(&mut doc);
        batch.audit(&doc.id, &actor(), AuditAction::DocumentCreated, "");
        repo.commit(batch).unwrap();

        let mut winner = doc.clone();
        let mut loser = doc.clone();

        winner.manager_notes = Some("winner".to_string());
        let mut batch = WriteBatch::new();
        batch.put_document(&mut winner);
        batch.audit(&doc.id, &actor(), AuditAction::Annotated, "manager_notes");
        repo.commit(batch).unwrap();

        loser.manager_notes = Some("loser".to_string());
        let mut batch = WriteBatch::new();
        batch.put_document(&mut loser);
        batch.audit(&doc.id, &actor(), AuditAction::Annotated, "manager_notes");
        let err = repo.commit(batch).unwrap_err();
        assert!(matches!(err, AgendaError::Conflict { .. }));

        let stored = repo.document(&doc.id).unwrap().unwrap();
        assert_eq!(stored.manager_notes.as_deref(), Some("winner"));
        assert_eq!(repo.audit_log(&doc.id).unwrap().len(), 2);
    }
}
