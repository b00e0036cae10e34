//! Document command.
//!
//! Generates, annotates and moves proposal documents through their
//! lifecycle, and shows a document together with its audit trail.

use serde::Serialize;

use crate::cli::{render, CommandFailure, OutputOptions};
use crate::core::{
    Actor, AuditEntry, CommentAnalysis, DocumentStatus, ManagerAnnotation, ProposalDocument,
};
use crate::error::Result;
use crate::storage::Repository;
use crate::workflow::ProposalDocumentStore;

/// Output format for the document command.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Documents affected or listed.
    pub documents: Vec<ProposalDocument>,
    /// Audit trail, for `show`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audit: Vec<AuditEntry>,
    /// Error details if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

impl DocumentOutput {
    /// Create a successful output.
    pub fn success(documents: Vec<ProposalDocument>, audit: Vec<AuditEntry>) -> Self {
        Self {
            success: true,
            documents,
            audit,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: CommandFailure) -> Self {
        Self {
            success: false,
            documents: Vec::new(),
            audit: Vec::new(),
            error: Some(error),
        }
    }

    fn single(result: Result<ProposalDocument>) -> Self {
        match result {
            Ok(doc) => Self::success(vec![doc], Vec::new()),
            Err(e) => Self::failure(CommandFailure::from(&e)),
        }
    }
}

/// The document command implementation.
pub struct DocumentCommand<R: Repository> {
    documents: ProposalDocumentStore<R>,
}

impl<R: Repository> DocumentCommand<R> {
    /// Create a new document command.
    pub fn new(documents: ProposalDocumentStore<R>) -> Self {
        Self { documents }
    }

    /// Generate a document for an agenda-level proposal.
    pub fn generate(
        &self,
        proposal_id: &str,
        comments: CommentAnalysis,
        creator: &Actor,
    ) -> DocumentOutput {
        DocumentOutput::single(self.documents.generate(proposal_id, comments, creator))
    }

    /// Apply manager edits.
    pub fn annotate(
        &self,
        document_id: &str,
        annotation: ManagerAnnotation,
        editor: &Actor,
    ) -> DocumentOutput {
        DocumentOutput::single(self.documents.annotate(document_id, annotation, editor))
    }

    /// Move a draft into review.
    pub fn request_review(&self, document_id: &str, actor: &Actor) -> DocumentOutput {
        DocumentOutput::single(self.documents.request_review(document_id, actor))
    }

    /// Send a document under review back to draft.
    pub fn return_to_draft(&self, document_id: &str, actor: &Actor) -> DocumentOutput {
        DocumentOutput::single(self.documents.return_to_draft(document_id, actor))
    }

    /// Mark a committee-eligible draft ready for submission.
    pub fn ready(&self, document_id: &str, actor: &Actor) -> DocumentOutput {
        DocumentOutput::single(self.documents.mark_ready(document_id, actor))
    }

    /// Show a document and its audit trail.
    pub fn show(&self, document_id: &str) -> DocumentOutput {
        let result = self
            .documents
            .get(document_id)
            .and_then(|doc| Ok((doc, self.documents.audit_log(document_id)?)));
        match result {
            Ok((doc, audit)) => DocumentOutput::success(vec![doc], audit),
            Err(e) => DocumentOutput::failure(CommandFailure::from(&e)),
        }
    }

    /// List documents, optionally by status.
    pub fn list(&self, status: Option<&str>) -> DocumentOutput {
        let result = status
            .map(str::parse::<DocumentStatus>)
            .transpose()
            .and_then(|status| self.documents.list(status));
        match result {
            Ok(docs) => DocumentOutput::success(docs, Vec::new()),
            Err(e) => DocumentOutput::failure(CommandFailure::from(&e)),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &DocumentOutput, options: &OutputOptions) -> String {
        render(output, options, format_human_readable)
    }
}

/// Format output as human-readable text.
fn format_human_readable(output: &DocumentOutput) -> String {
    if let Some(error) = &output.error {
        return format!("Document command failed: {}\n", error.message);
    }

    if output.documents.is_empty() {
        return "No documents.\n".to_string();
    }

    let mut out = String::new();
    for doc in &output.documents {
        out.push_str(&format!(
            "{}  [{}]  {}  (proposal {})\n",
            doc.id,
            doc.status.as_str(),
            doc.title,
            doc.proposal_id
        ));
        out.push_str(&format!(
            "    votes {} ({:.1}% support, {:.1}% opposed)",
            doc.vote_analysis.total_votes,
            doc.vote_analysis.support_rate,
            doc.vote_analysis.opposition_rate
        ));
        if doc.committee_eligible {
            out.push_str("  committee eligible");
        }
        if let Some(committee) = &doc.target_committee {
            out.push_str(&format!("  submitted to {}", committee));
        }
        out.push('\n');
    }

    if !output.audit.is_empty() {
        out.push_str("\nAudit trail:\n");
        for entry in &output.audit {
            out.push_str(&format!(
                "  #{:<3} {}  {:<20} {} (level {})\n",
                entry.seq,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.action.as_str(),
                entry.actor_name,
                entry.actor_permission_level
            ));
        }
    }
    out
}
