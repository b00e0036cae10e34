//! Proposal document lifecycle: draft → under_review → ready → submitted.
//!
//! Every state change is committed together with exactly one audit entry.
//! Finalizing a document as submitted is crate-private so that only the
//! submission coordinator can do it, after a second party approved.

use tracing::{debug, info};

use crate::config::Config;
use crate::core::narrative::{derive_title, synthesize};
use crate::core::{
    Actor, AgendaLevel, AuditAction, AuditEntry, CommentAnalysis, DocumentStatus,
    ManagerAnnotation, Proposal, ProposalDocument, VoteAnalysis,
};
use crate::error::{AgendaError, Result};
use crate::storage::{Repository, WriteBatch};
use crate::workflow::policy::{Operation, PermissionPolicy};

/// Owns proposal documents and their audit logs.
#[derive(Debug, Clone)]
pub struct ProposalDocumentStore<R: Repository> {
    repo: R,
    policy: PermissionPolicy,
}

impl<R: Repository> ProposalDocumentStore<R> {
    /// Create a document store over a repository.
    pub fn new(repo: R, config: &Config) -> Self {
        Self {
            repo,
            policy: PermissionPolicy::new(config.permissions.clone()),
        }
    }

    pub(crate) fn repository(&self) -> &R {
        &self.repo
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Generate the decision document for an approved or escalated proposal.
    ///
    /// The vote snapshot is taken from the proposal's current tally; the
    /// comment snapshot is supplied by the caller.
    pub fn generate(
        &self,
        proposal_id: &str,
        comments: CommentAnalysis,
        creator: &Actor,
    ) -> Result<ProposalDocument> {
        self.policy.authorize(creator, Operation::GenerateDocument)?;

        let proposal = self
            .repo
            .proposal(proposal_id)?
            .ok_or_else(|| AgendaError::not_found("proposal", proposal_id))?;

        if !matches!(
            proposal.agenda_level,
            AgendaLevel::DeptAgenda | AgendaLevel::FacilityAgenda
        ) {
            return Err(AgendaError::invalid_state(format!(
                "documents are generated for DEPT_AGENDA or FACILITY_AGENDA proposals, \
                 proposal {} is {}",
                proposal.id, proposal.agenda_level
            )));
        }

        if let Some(existing) = self.repo.document_for_proposal(proposal_id)? {
            return Err(AgendaError::conflict(format!(
                "proposal {} already has document {}",
                proposal_id, existing.id
            )));
        }

        let mut batch = WriteBatch::new();
        let document = self.stage_generate(&mut batch, &proposal, comments, creator, false);
        self.repo.commit(batch)?;

        info!(
            document = %document.id,
            proposal = %proposal.id,
            actor = %creator.id,
            "Generated proposal document"
        );
        Ok(document)
    }

    /// Apply manager edits to a draft or under-review document.
    pub fn annotate(
        &self,
        document_id: &str,
        annotation: ManagerAnnotation,
        editor: &Actor,
    ) -> Result<ProposalDocument> {
        self.policy.authorize(editor, Operation::AnnotateDocument)?;

        let mut document = self.get(document_id)?;

        if annotation.is_empty() {
            return Err(AgendaError::validation(
                "annotation must set at least one of manager_notes, additional_context, \
                 recommendation_level",
            ));
        }
        if !document.status.is_editable() {
            return Err(AgendaError::invalid_state(format!(
                "cannot annotate a {} document",
                document.status
            )));
        }

        document.apply_annotation(&annotation);
        document.touch();

        let mut batch = WriteBatch::new();
        batch.put_document(&mut document);
        batch.audit(
            &document.id,
            editor,
            AuditAction::Annotated,
            annotation.field_names().join(", "),
        );
        self.repo.commit(batch)?;

        info!(document = %document.id, actor = %editor.id, "Annotated document");
        Ok(document)
    }

    /// Send a draft into internal review.
    pub fn request_review(&self, document_id: &str, actor: &Actor) -> Result<ProposalDocument> {
        self.move_status(
            document_id,
            actor,
            DocumentStatus::Draft,
            DocumentStatus::UnderReview,
            AuditAction::ReviewRequested,
        )
    }

    /// Take a document out of internal review, back to draft.
    pub fn return_to_draft(&self, document_id: &str, actor: &Actor) -> Result<ProposalDocument> {
        self.move_status(
            document_id,
            actor,
            DocumentStatus::UnderReview,
            DocumentStatus::Draft,
            AuditAction::ReturnedToDraft,
        )
    }

    /// Freeze a committee-eligible draft as ready for submission.
    pub fn mark_ready(&self, document_id: &str, actor: &Actor) -> Result<ProposalDocument> {
        self.policy.authorize(actor, Operation::MarkReady)?;

        let mut document = self.get(document_id)?;

        if document.status != DocumentStatus::Draft {
            return Err(AgendaError::invalid_state(format!(
                "cannot mark a {} document ready",
                document.status
            )));
        }
        if !document.committee_eligible {
            return Err(AgendaError::invalid_state(format!(
                "document {} has not been approved for committee by the facility gate",
                document.id
            )));
        }

        document.status = DocumentStatus::Ready;
        document.touch();

        let mut batch = WriteBatch::new();
        batch.put_document(&mut document);
        batch.audit(&document.id, actor, AuditAction::MarkedReady, "draft -> ready");
        self.repo.commit(batch)?;

        info!(document = %document.id, actor = %actor.id, "Marked document ready");
        Ok(document)
    }

    fn move_status(
        &self,
        document_id: &str,
        actor: &Actor,
        from: DocumentStatus,
        to: DocumentStatus,
        action: AuditAction,
    ) -> Result<ProposalDocument> {
        self.policy.authorize(actor, Operation::ReviewDocument)?;

        let mut document = self.get(document_id)?;
        if document.status != from {
            return Err(AgendaError::invalid_state(format!(
                "cannot move a {} document to {}",
                document.status, to
            )));
        }

        document.status = to;
        document.touch();

        let mut batch = WriteBatch::new();
        batch.put_document(&mut document);
        batch.audit(&document.id, actor, action, format!("{} -> {}", from, to));
        self.repo.commit(batch)?;

        info!(document = %document.id, from = %from, to = %to, "Moved document");
        Ok(document)
    }

    // =========================================================================
    // Staged writes shared with the review handlers and the coordinator
    // =========================================================================

    /// Stage a new draft document and its `document_created` entry.
    pub(crate) fn stage_generate(
        &self,
        batch: &mut WriteBatch,
        proposal: &Proposal,
        comments: CommentAnalysis,
        creator: &Actor,
        committee_eligible: bool,
    ) -> ProposalDocument {
        let votes = VoteAnalysis::from(proposal.vote_count);
        let sections = synthesize(proposal, &votes, &comments);
        let mut document = ProposalDocument::new(
            &proposal.id,
            derive_title(&proposal.content),
            sections,
            votes,
            comments,
            creator.clone(),
        );
        document.committee_eligible = committee_eligible;

        let mut details = format!(
            "generated from proposal {} at {} (score {})",
            proposal.id, proposal.agenda_level, proposal.agenda_score
        );
        if committee_eligible {
            details.push_str("; approved for committee");
        }

        batch.put_document(&mut document);
        batch.audit(&document.id, creator, AuditAction::DocumentCreated, details);
        document
    }

    /// Stage the facility gate's committee clearance on an existing document.
    pub(crate) fn stage_committee_eligible(
        &self,
        batch: &mut WriteBatch,
        document: &mut ProposalDocument,
        actor: &Actor,
    ) {
        document.committee_eligible = true;
        document.touch();
        batch.put_document(document);
        batch.audit(
            &document.id,
            actor,
            AuditAction::CommitteeEligible,
            "approved for committee at the facility gate",
        );
    }

    /// Stage `ready → submitted` and stamp the target committee.
    ///
    /// Only the submission coordinator calls this, inside the same batch that
    /// approves the request.
    pub(crate) fn finalize_submission(
        &self,
        batch: &mut WriteBatch,
        document_id: &str,
        target_committee: &str,
        approver: &Actor,
    ) -> Result<ProposalDocument> {
        let mut document = self.get(document_id)?;

        if document.status != DocumentStatus::Ready {
            return Err(AgendaError::invalid_state(format!(
                "only ready documents can be submitted, document {} is {}",
                document.id, document.status
            )));
        }

        document.status = DocumentStatus::Submitted;
        document.target_committee = Some(target_committee.to_string());
        document.submitted_at = Some(chrono::Utc::now());
        document.touch();

        batch.put_document(&mut document);
        batch.audit(
            &document.id,
            approver,
            AuditAction::Submitted,
            format!("submitted to {}", target_committee),
        );
        Ok(document)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a document by id.
    pub fn get(&self, document_id: &str) -> Result<ProposalDocument> {
        debug!(document = %document_id, "Loading document");
        self.repo
            .document(document_id)?
            .ok_or_else(|| AgendaError::not_found("document", document_id))
    }

    /// The document generated from a proposal, if any.
    pub fn find_by_proposal(&self, proposal_id: &str) -> Result<Option<ProposalDocument>> {
        self.repo.document_for_proposal(proposal_id)
    }

    /// All documents, optionally filtered by status, newest first.
    pub fn list(&self, status: Option<DocumentStatus>) -> Result<Vec<ProposalDocument>> {
        let mut documents: Vec<ProposalDocument> = self
            .repo
            .documents()?
            .into_iter()
            .filter(|d| status.map(|s| d.status == s).unwrap_or(true))
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    /// A document's audit log in sequence order.
    pub fn audit_log(&self, document_id: &str) -> Result<Vec<AuditEntry>> {
        // Distinguish an unknown document from an empty log
        self.get(document_id)?;
        self.repo.audit_log(document_id)
    }
}
