//! The persisted repository state and its commit rules.
//!
//! Both repository backends hold a [`RepositoryState`] and delegate commits
//! to [`RepositoryState::apply`], which validates the whole batch before
//! touching anything.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AuditEntry, Proposal, ProposalDocument, SubmissionRequest};
use crate::error::{AgendaError, Result};
use crate::storage::batch::{Write, WriteBatch};

/// Schema version of the state snapshot.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Everything the workflow persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub proposals: BTreeMap<String, Proposal>,
    #[serde(default)]
    pub documents: BTreeMap<String, ProposalDocument>,
    #[serde(default)]
    pub requests: BTreeMap<String, SubmissionRequest>,
    /// Audit logs keyed by document id.
    #[serde(default)]
    pub audit: BTreeMap<String, Vec<AuditEntry>>,
}

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Proposal,
    Document,
    Request,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Proposal => "proposal",
            Kind::Document => "document",
            Kind::Request => "request",
        }
    }
}

impl RepositoryState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            ..Default::default()
        }
    }

    /// Apply a batch atomically.
    ///
    /// Fails with `Conflict` when any entity changed since it was read, when a
    /// second document is created for a proposal, or when a document would end
    /// up with more than one pending request. On error nothing is applied.
    pub fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        self.validate(&batch)?;

        for write in batch.into_writes() {
            match write {
                Write::Proposal { proposal, .. } => {
                    self.proposals.insert(proposal.id.clone(), proposal);
                }
                Write::Document { document, .. } => {
                    self.documents.insert(document.id.clone(), document);
                }
                Write::Request { request, .. } => {
                    self.requests.insert(request.id.clone(), request);
                }
                Write::Audit {
                    document_id,
                    actor,
                    action,
                    details,
                } => {
                    let log = self.audit.entry(document_id).or_default();
                    let mut timestamp = Utc::now();
                    if let Some(last) = log.last() {
                        if timestamp <= last.timestamp {
                            timestamp = last.timestamp + Duration::microseconds(1);
                        }
                    }
                    log.push(AuditEntry {
                        seq: log.len() as u64 + 1,
                        timestamp,
                        actor_id: actor.id,
                        actor_name: actor.name,
                        actor_permission_level: actor.permission_level,
                        action,
                        details,
                    });
                }
            }
        }

        Ok(())
    }

    fn current_version(&self, kind: Kind, id: &str) -> u64 {
        match kind {
            Kind::Proposal => self.proposals.get(id).map(|p| p.version),
            Kind::Document => self.documents.get(id).map(|d| d.version),
            Kind::Request => self.requests.get(id).map(|r| r.version),
        }
        .unwrap_or(0)
    }

    fn validate(&self, batch: &WriteBatch) -> Result<()> {
        // Versions as they will be after earlier writes in the same batch
        let mut staged: HashMap<(Kind, &str), u64> = HashMap::new();
        let mut new_documents: HashMap<&str, &str> = HashMap::new();
        let mut staged_requests: HashMap<&str, &SubmissionRequest> = HashMap::new();
        let mut staged_documents: HashSet<&str> = HashSet::new();

        for write in batch.writes() {
            let (kind, id, expected) = match write {
                Write::Proposal {
                    proposal,
                    expected_version,
                } => (Kind::Proposal, proposal.id.as_str(), *expected_version),
                Write::Document {
                    document,
                    expected_version,
                } => {
                    staged_documents.insert(document.id.as_str());
                    if *expected_version == 0 {
                        self.check_single_document(document, &new_documents)?;
                        new_documents.insert(document.proposal_id.as_str(), document.id.as_str());
                    }
                    (Kind::Document, document.id.as_str(), *expected_version)
                }
                Write::Request {
                    request,
                    expected_version,
                } => {
                    staged_requests.insert(request.id.as_str(), request);
                    (Kind::Request, request.id.as_str(), *expected_version)
                }
                Write::Audit { document_id, .. } => {
                    if !self.documents.contains_key(document_id)
                        && !staged_documents.contains(document_id.as_str())
                    {
                        return Err(AgendaError::not_found("document", document_id.clone()));
                    }
                    continue;
                }
            };

            let current = staged
                .get(&(kind, id))
                .copied()
                .unwrap_or_else(|| self.current_version(kind, id));

            if current != expected {
                return Err(if expected == 0 {
                    AgendaError::conflict(format!("{} {} already exists", kind.as_str(), id))
                } else {
                    AgendaError::conflict(format!(
                        "{} {} was modified concurrently (expected version {}, found {})",
                        kind.as_str(),
                        id,
                        expected,
                        current
                    ))
                });
            }
            staged.insert((kind, id), expected + 1);
        }

        self.check_pending_slots(&staged_requests)
    }

    fn check_single_document(
        &self,
        document: &ProposalDocument,
        new_documents: &HashMap<&str, &str>,
    ) -> Result<()> {
        let taken = new_documents.contains_key(document.proposal_id.as_str())
            || self
                .documents
                .values()
                .any(|d| d.proposal_id == document.proposal_id && d.id != document.id);
        if taken {
            return Err(AgendaError::conflict(format!(
                "proposal {} already has a document",
                document.proposal_id
            )));
        }
        Ok(())
    }

    /// At most one pending request per document, counting the batch's writes.
    fn check_pending_slots(&self, staged: &HashMap<&str, &SubmissionRequest>) -> Result<()> {
        let touched: HashSet<&str> = staged
            .values()
            .filter(|r| r.is_pending())
            .map(|r| r.document_id.as_str())
            .collect();

        for document_id in touched {
            let stored = self.requests.values().filter(|r| {
                r.document_id == document_id && r.is_pending() && !staged.contains_key(r.id.as_str())
            });
            let batched = staged
                .values()
                .filter(|r| r.document_id == document_id && r.is_pending());

            if stored.count() + batched.count() > 1 {
                return Err(AgendaError::conflict(format!(
                    "document {} already has a pending submission request",
                    document_id
                )));
            }
        }

        Ok(())
    }
}
