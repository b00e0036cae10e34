//! Write batches: the unit of atomic commit.
//!
//! A batch carries every entity a single operation changes, each tagged with
//! the version it was read at, plus the audit entries that describe the
//! change. The repository applies all of it or none of it.

use crate::core::{Actor, AuditAction, Proposal, ProposalDocument, SubmissionRequest};

/// One staged write.
#[derive(Debug, Clone)]
pub enum Write {
    /// Insert (expected version 0) or update a proposal.
    Proposal {
        proposal: Proposal,
        expected_version: u64,
    },
    /// Insert (expected version 0) or update a document.
    Document {
        document: ProposalDocument,
        expected_version: u64,
    },
    /// Insert (expected version 0) or update a submission request.
    Request {
        request: SubmissionRequest,
        expected_version: u64,
    },
    /// Append an audit entry to a document's log.
    Audit {
        document_id: String,
        actor: Actor,
        action: AuditAction,
        details: String,
    },
}

/// An ordered set of writes committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a proposal write and bump its version in place.
    ///
    /// The caller's copy then matches what the repository stores.
    pub fn put_proposal(&mut self, proposal: &mut Proposal) {
        let expected_version = proposal.version;
        proposal.version += 1;
        self.writes.push(Write::Proposal {
            proposal: proposal.clone(),
            expected_version,
        });
    }

    /// Stage a document write and bump its version in place.
    pub fn put_document(&mut self, document: &mut ProposalDocument) {
        let expected_version = document.version;
        document.version += 1;
        self.writes.push(Write::Document {
            document: document.clone(),
            expected_version,
        });
    }

    /// Stage a request write and bump its version in place.
    pub fn put_request(&mut self, request: &mut SubmissionRequest) {
        let expected_version = request.version;
        request.version += 1;
        self.writes.push(Write::Request {
            request: request.clone(),
            expected_version,
        });
    }

    /// Stage an audit entry. Sequence number and timestamp are assigned at commit.
    pub fn audit(
        &mut self,
        document_id: impl Into<String>,
        actor: &Actor,
        action: AuditAction,
        details: impl Into<String>,
    ) {
        self.writes.push(Write::Audit {
            document_id: document_id.into(),
            actor: actor.clone(),
            action,
            details: details.into(),
        });
    }

    /// Staged writes in order.
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Consume the batch.
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Check if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of staged audit entries.
    pub fn audit_count(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w, Write::Audit { .. }))
            .count()
    }
}
