//! Committee submission requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::actor::Actor;
use crate::error::AgendaError;

/// Status of a submission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(AgendaError::validation(format!(
                "unknown submission status: {}",
                other
            ))),
        }
    }
}

/// A request to submit a ready document to a committee.
///
/// Requests are never deleted; a rejected request stays on record and a new
/// one may be opened for the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionRequest {
    /// Request identifier.
    pub id: String,
    pub document_id: String,
    /// Document title at request time, kept for display.
    pub document_title: String,
    pub proposal_id: String,
    /// Preparer, with the permission level held when requesting.
    pub requester: Actor,
    pub requested_date: DateTime<Utc>,
    pub target_committee: String,
    pub status: SubmissionStatus,
    pub reviewer: Option<Actor>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Approval notes or rejection reason.
    pub review_notes: Option<String>,
    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl SubmissionRequest {
    /// Create a new pending request.
    pub fn new(
        document_id: impl Into<String>,
        document_title: impl Into<String>,
        proposal_id: impl Into<String>,
        target_committee: impl Into<String>,
        requester: Actor,
    ) -> Self {
        Self {
            id: generate_request_id(),
            document_id: document_id.into(),
            document_title: document_title.into(),
            proposal_id: proposal_id.into(),
            requester,
            requested_date: Utc::now(),
            target_committee: target_committee.into(),
            status: SubmissionStatus::Pending,
            reviewer: None,
            reviewed_at: None,
            review_notes: None,
            version: 0,
        }
    }

    /// Check if the request still awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }

    /// Record the approver's or rejecter's decision.
    pub fn resolve(&mut self, status: SubmissionStatus, reviewer: &Actor, notes: Option<String>) {
        self.status = status;
        self.reviewer = Some(reviewer.clone());
        self.reviewed_at = Some(Utc::now());
        self.review_notes = notes;
    }
}

/// Generate a unique request id.
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}
