//! Committee submission handshake.
//!
//! A preparer opens a request for a ready document; a second, higher-ranked
//! party approves or rejects it. Approval finalizes the document in the same
//! commit, so a request is never approved without its document submitted.

use tracing::{debug, info};

use crate::config::{CommitteesConfig, Config};
use crate::core::{Actor, AuditAction, DocumentStatus, SubmissionRequest, SubmissionStatus};
use crate::error::{AgendaError, Result};
use crate::storage::{Repository, WriteBatch};
use crate::workflow::documents::ProposalDocumentStore;
use crate::workflow::policy::{Operation, PermissionPolicy};

/// Owns submission requests and the preparer / approver handshake.
#[derive(Debug, Clone)]
pub struct CommitteeSubmissionCoordinator<R: Repository> {
    documents: ProposalDocumentStore<R>,
    policy: PermissionPolicy,
    committees: CommitteesConfig,
}

impl<R: Repository> CommitteeSubmissionCoordinator<R> {
    /// Create a coordinator that finalizes documents through `documents`.
    pub fn new(documents: ProposalDocumentStore<R>, config: &Config) -> Self {
        Self {
            documents,
            policy: PermissionPolicy::new(config.permissions.clone()),
            committees: config.committees.clone(),
        }
    }

    fn repo(&self) -> &R {
        self.documents.repository()
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Open a pending request to send a ready document to a committee.
    ///
    /// Checks run in order: permission, document existence, committee name,
    /// document status, pending slot.
    pub fn create_request(
        &self,
        document_id: &str,
        target_committee: &str,
        requester: &Actor,
    ) -> Result<SubmissionRequest> {
        self.policy.authorize(requester, Operation::RequestSubmission)?;

        let document = self.documents.get(document_id)?;

        let committee = target_committee.trim();
        if committee.is_empty() {
            return Err(AgendaError::validation("target committee is required"));
        }
        if !self.committees.accepts(committee) {
            return Err(AgendaError::validation(format!(
                "unknown committee: {} (allowed: {})",
                committee,
                self.committees.allowed.join(", ")
            )));
        }

        if document.status != DocumentStatus::Ready {
            return Err(AgendaError::invalid_state(format!(
                "document {} is {}, only ready documents can be submitted",
                document.id, document.status
            )));
        }

        if let Some(pending) = self
            .repo()
            .requests()?
            .into_iter()
            .find(|r| r.document_id == document.id && r.is_pending())
        {
            return Err(AgendaError::conflict(format!(
                "document {} already has a pending submission request ({})",
                document.id, pending.id
            )));
        }

        let mut request = SubmissionRequest::new(
            &document.id,
            &document.title,
            &document.proposal_id,
            committee,
            requester.clone(),
        );

        let mut batch = WriteBatch::new();
        batch.put_request(&mut request);
        // Claim the document version so a concurrent status change loses
        let mut claimed = document;
        batch.put_document(&mut claimed);
        batch.audit(
            &claimed.id,
            requester,
            AuditAction::SubmissionRequested,
            format!("request {} to {}", request.id, committee),
        );
        self.repo().commit(batch)?;

        info!(
            request = %request.id,
            document = %request.document_id,
            committee = %request.target_committee,
            requester = %requester.id,
            "Opened submission request"
        );
        Ok(request)
    }

    /// Approve a pending request and submit its document.
    pub fn approve(
        &self,
        request_id: &str,
        approver: &Actor,
        notes: Option<&str>,
    ) -> Result<SubmissionRequest> {
        self.policy.authorize(approver, Operation::ApproveSubmission)?;

        let mut request = self.pending(request_id)?;

        let mut batch = WriteBatch::new();
        self.documents.finalize_submission(
            &mut batch,
            &request.document_id,
            &request.target_committee,
            approver,
        )?;

        let notes = notes.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        request.resolve(SubmissionStatus::Approved, approver, notes);
        batch.put_request(&mut request);
        self.repo().commit(batch)?;

        info!(
            request = %request.id,
            document = %request.document_id,
            committee = %request.target_committee,
            approver = %approver.id,
            "Approved submission request"
        );
        Ok(request)
    }

    /// Reject a pending request. The document stays ready.
    pub fn reject(
        &self,
        request_id: &str,
        reviewer: &Actor,
        reason: &str,
    ) -> Result<SubmissionRequest> {
        self.policy.authorize(reviewer, Operation::RejectSubmission)?;

        let mut request = self.pending(request_id)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AgendaError::validation("rejection reason is required"));
        }

        let mut document = self.documents.get(&request.document_id)?;

        request.resolve(
            SubmissionStatus::Rejected,
            reviewer,
            Some(reason.to_string()),
        );

        let mut batch = WriteBatch::new();
        batch.put_request(&mut request);
        batch.put_document(&mut document);
        batch.audit(
            &document.id,
            reviewer,
            AuditAction::SubmissionRejected,
            format!("request {}: {}", request.id, reason),
        );
        self.repo().commit(batch)?;

        info!(
            request = %request.id,
            document = %request.document_id,
            reviewer = %reviewer.id,
            "Rejected submission request"
        );
        Ok(request)
    }

    /// Load a request and require it to be pending.
    fn pending(&self, request_id: &str) -> Result<SubmissionRequest> {
        let request = self.get(request_id)?;
        if !request.is_pending() {
            return Err(AgendaError::invalid_state(format!(
                "request {} is already {}",
                request.id, request.status
            )));
        }
        Ok(request)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a request by id.
    pub fn get(&self, request_id: &str) -> Result<SubmissionRequest> {
        self.repo()
            .request(request_id)?
            .ok_or_else(|| AgendaError::not_found("request", request_id))
    }

    /// All requests, newest first.
    pub fn all_requests(&self) -> Result<Vec<SubmissionRequest>> {
        self.query(|_| true)
    }

    /// Requests awaiting a decision, newest first.
    pub fn pending_requests(&self) -> Result<Vec<SubmissionRequest>> {
        self.query(SubmissionRequest::is_pending)
    }

    /// Requests opened by a user, newest first.
    pub fn requests_by_user(&self, user_id: &str) -> Result<Vec<SubmissionRequest>> {
        self.query(|r| r.requester.id == user_id)
    }

    /// Requests addressed to a committee, newest first.
    pub fn requests_by_committee(&self, committee: &str) -> Result<Vec<SubmissionRequest>> {
        let committee = committee.trim();
        self.query(|r| r.target_committee == committee)
    }

    fn query<F>(&self, filter: F) -> Result<Vec<SubmissionRequest>>
    where
        F: Fn(&SubmissionRequest) -> bool,
    {
        let mut requests: Vec<SubmissionRequest> = self
            .repo()
            .requests()?
            .into_iter()
            .filter(|r| filter(r))
            .collect();
        requests.sort_by(|a, b| b.requested_date.cmp(&a.requested_date));
        debug!(count = requests.len(), "Queried submission requests");
        Ok(requests)
    }
}
