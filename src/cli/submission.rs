//! Submission command.
//!
//! The committee handshake: a preparer requests, an approver approves or
//! rejects.

use serde::Serialize;

use crate::cli::{render, CommandFailure, OutputOptions};
use crate::core::{Actor, SubmissionRequest};
use crate::error::Result;
use crate::storage::Repository;
use crate::workflow::CommitteeSubmissionCoordinator;

/// Filters for `submission list`. Filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Only pending requests.
    pub pending: bool,
    /// Only requests made by this user id.
    pub user: Option<String>,
    /// Only requests targeting this committee.
    pub committee: Option<String>,
}

impl RequestFilter {
    fn matches(&self, request: &SubmissionRequest) -> bool {
        (!self.pending || request.is_pending())
            && self
                .user
                .as_deref()
                .map_or(true, |u| request.requester.id == u)
            && self
                .committee
                .as_deref()
                .map_or(true, |c| request.target_committee == c)
    }
}

/// Output format for the submission command.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Requests affected or listed.
    pub requests: Vec<SubmissionRequest>,
    /// Error details if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

impl SubmissionOutput {
    /// Create a successful output.
    pub fn success(requests: Vec<SubmissionRequest>) -> Self {
        Self {
            success: true,
            requests,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: CommandFailure) -> Self {
        Self {
            success: false,
            requests: Vec::new(),
            error: Some(error),
        }
    }

    fn from_result(result: Result<Vec<SubmissionRequest>>) -> Self {
        match result {
            Ok(requests) => Self::success(requests),
            Err(e) => Self::failure(CommandFailure::from(&e)),
        }
    }
}

/// The submission command implementation.
pub struct SubmissionCommand<R: Repository> {
    submissions: CommitteeSubmissionCoordinator<R>,
}

impl<R: Repository> SubmissionCommand<R> {
    /// Create a new submission command.
    pub fn new(submissions: CommitteeSubmissionCoordinator<R>) -> Self {
        Self { submissions }
    }

    /// Request submission of a ready document.
    pub fn request(&self, document_id: &str, committee: &str, requester: &Actor) -> SubmissionOutput {
        SubmissionOutput::from_result(
            self.submissions
                .create_request(document_id, committee, requester)
                .map(|r| vec![r]),
        )
    }

    /// Approve a pending request.
    pub fn approve(&self, request_id: &str, approver: &Actor, notes: Option<&str>) -> SubmissionOutput {
        SubmissionOutput::from_result(
            self.submissions
                .approve(request_id, approver, notes)
                .map(|r| vec![r]),
        )
    }

    /// Reject a pending request.
    pub fn reject(&self, request_id: &str, reviewer: &Actor, reason: &str) -> SubmissionOutput {
        SubmissionOutput::from_result(
            self.submissions
                .reject(request_id, reviewer, reason)
                .map(|r| vec![r]),
        )
    }

    /// Show one request.
    pub fn show(&self, request_id: &str) -> SubmissionOutput {
        SubmissionOutput::from_result(self.submissions.get(request_id).map(|r| vec![r]))
    }

    /// List requests, newest first.
    pub fn list(&self, filter: &RequestFilter) -> SubmissionOutput {
        let base = match (&filter.user, &filter.committee, filter.pending) {
            (Some(user), None, _) => self.submissions.requests_by_user(user),
            (None, Some(committee), _) => self.submissions.requests_by_committee(committee),
            (None, None, true) => self.submissions.pending_requests(),
            _ => self.submissions.all_requests(),
        };
        SubmissionOutput::from_result(
            base.map(|requests| requests.into_iter().filter(|r| filter.matches(r)).collect()),
        )
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SubmissionOutput, options: &OutputOptions) -> String {
        render(output, options, format_human_readable)
    }
}

/// Format output as human-readable text.
fn format_human_readable(output: &SubmissionOutput) -> String {
    if let Some(error) = &output.error {
        return format!("Submission command failed: {}\n", error.message);
    }

    if output.requests.is_empty() {
        return "No submission requests.\n".to_string();
    }

    let mut out = String::new();
    for r in &output.requests {
        out.push_str(&format!(
            "{}  [{}]  {} -> {}  by {} on {}\n",
            r.id,
            r.status.as_str(),
            r.document_title,
            r.target_committee,
            r.requester.name,
            r.requested_date.format("%Y-%m-%d")
        ));
        if let Some(reviewer) = &r.reviewer {
            out.push_str(&format!(
                "    reviewed by {}{}\n",
                reviewer.name,
                r.review_notes
                    .as_deref()
                    .map(|n| format!(": {}", n))
                    .unwrap_or_default()
            ));
        }
    }
    out
}
