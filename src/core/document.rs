//! Proposal documents and their audit trail.
//!
//! A document is generated once from a proposal that passed a review gate.
//! Its narrative is fixed at generation; later edits only touch the manager
//! fields, and every change is recorded as an [`AuditEntry`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::actor::Actor;
use crate::core::state::VoteCount;
use crate::error::AgendaError;

/// Lifecycle status of a proposal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Freshly generated, editable.
    #[default]
    Draft,
    /// Circulating for internal review, still editable.
    UnderReview,
    /// Frozen and eligible for a submission request.
    Ready,
    /// Accepted by a committee approver. Final.
    Submitted,
}

impl DocumentStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::UnderReview => "under_review",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Submitted => "submitted",
        }
    }

    /// Check if manager fields may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::UnderReview)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DocumentStatus::Draft),
            "under_review" => Ok(DocumentStatus::UnderReview),
            "ready" => Ok(DocumentStatus::Ready),
            "submitted" => Ok(DocumentStatus::Submitted),
            other => Err(AgendaError::validation(format!(
                "unknown document status: {}",
                other
            ))),
        }
    }
}

/// A manager's overall recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    StronglyRecommend,
    Recommend,
    Neutral,
    NotRecommend,
}

impl RecommendationLevel {
    /// Wire name of the recommendation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationLevel::StronglyRecommend => "strongly_recommend",
            RecommendationLevel::Recommend => "recommend",
            RecommendationLevel::Neutral => "neutral",
            RecommendationLevel::NotRecommend => "not_recommend",
        }
    }
}

impl fmt::Display for RecommendationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationLevel {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strongly_recommend" => Ok(RecommendationLevel::StronglyRecommend),
            "recommend" => Ok(RecommendationLevel::Recommend),
            "neutral" => Ok(RecommendationLevel::Neutral),
            "not_recommend" => Ok(RecommendationLevel::NotRecommend),
            other => Err(AgendaError::validation(format!(
                "unknown recommendation level: {}",
                other
            ))),
        }
    }
}

/// Vote snapshot taken when the document was generated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct VoteAnalysis {
    pub total_votes: u64,
    /// Percentage of approve votes, 0-100.
    pub support_rate: f64,
    /// Percentage of oppose votes, 0-100.
    pub opposition_rate: f64,
}

impl From<VoteCount> for VoteAnalysis {
    fn from(votes: VoteCount) -> Self {
        let total = votes.total();
        let rate = |n: u32| {
            if total == 0 {
                0.0
            } else {
                (f64::from(n) / total as f64 * 1000.0).round() / 10.0
            }
        };

        Self {
            total_votes: total,
            support_rate: rate(votes.approve),
            opposition_rate: rate(votes.oppose),
        }
    }
}

/// Comment snapshot taken when the document was generated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentAnalysis {
    pub total_comments: u32,
    pub support_comments: u32,
    pub concern_comments: u32,
    pub proposal_comments: u32,
}

/// The six generated narrative sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NarrativeSections {
    pub summary: String,
    pub background: String,
    pub objectives: String,
    pub expected_effects: String,
    pub concerns: String,
    pub countermeasures: String,
}

/// Manager edits applied by `annotate`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerAnnotation {
    pub manager_notes: Option<String>,
    pub additional_context: Option<String>,
    pub recommendation_level: Option<RecommendationLevel>,
}

impl ManagerAnnotation {
    /// Check if the annotation carries no change at all.
    pub fn is_empty(&self) -> bool {
        self.manager_notes.is_none()
            && self.additional_context.is_none()
            && self.recommendation_level.is_none()
    }

    /// Names of the fields this annotation sets, for the audit trail.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.manager_notes.is_some() {
            fields.push("manager_notes");
        }
        if self.additional_context.is_some() {
            fields.push("additional_context");
        }
        if self.recommendation_level.is_some() {
            fields.push("recommendation_level");
        }
        fields
    }
}

/// A decision document generated from an approved or escalated proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalDocument {
    /// Document identifier.
    pub id: String,
    /// Source proposal id.
    pub proposal_id: String,
    /// Title derived from the proposal content.
    pub title: String,
    /// Generated narrative, never regenerated.
    pub sections: NarrativeSections,
    /// Lifecycle status.
    pub status: DocumentStatus,

    pub manager_notes: Option<String>,
    pub additional_context: Option<String>,
    pub recommendation_level: Option<RecommendationLevel>,

    /// Set only when a submission request is approved.
    pub target_committee: Option<String>,
    pub vote_analysis: VoteAnalysis,
    pub comment_analysis: CommentAnalysis,
    /// Cleared for committee submission by the facility gate.
    #[serde(default)]
    pub committee_eligible: bool,

    /// Who generated the document.
    pub created_by: Actor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl ProposalDocument {
    /// Create a new draft document.
    pub fn new(
        proposal_id: impl Into<String>,
        title: impl Into<String>,
        sections: NarrativeSections,
        vote_analysis: VoteAnalysis,
        comment_analysis: CommentAnalysis,
        created_by: Actor,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_document_id(),
            proposal_id: proposal_id.into(),
            title: title.into(),
            sections,
            status: DocumentStatus::Draft,
            manager_notes: None,
            additional_context: None,
            recommendation_level: None,
            target_committee: None,
            vote_analysis,
            comment_analysis,
            committee_eligible: false,
            created_by,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            version: 0,
        }
    }

    /// Apply manager edits. Fields left `None` keep their current value.
    pub fn apply_annotation(&mut self, annotation: &ManagerAnnotation) {
        if let Some(notes) = &annotation.manager_notes {
            self.manager_notes = Some(notes.clone());
        }
        if let Some(context) = &annotation.additional_context {
            self.additional_context = Some(context.clone());
        }
        if let Some(level) = annotation.recommendation_level {
            self.recommendation_level = Some(level);
        }
    }

    /// Update the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Generate a unique document id.
pub fn generate_document_id() -> String {
    format!("doc_{}", Uuid::new_v4().simple())
}

/// Kinds of audited document events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DocumentCreated,
    Annotated,
    ReviewRequested,
    ReturnedToDraft,
    CommitteeEligible,
    MarkedReady,
    SubmissionRequested,
    SubmissionRejected,
    Submitted,
}

impl AuditAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DocumentCreated => "document_created",
            AuditAction::Annotated => "annotated",
            AuditAction::ReviewRequested => "review_requested",
            AuditAction::ReturnedToDraft => "returned_to_draft",
            AuditAction::CommitteeEligible => "committee_eligible",
            AuditAction::MarkedReady => "marked_ready",
            AuditAction::SubmissionRequested => "submission_requested",
            AuditAction::SubmissionRejected => "submission_rejected",
            AuditAction::Submitted => "submitted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in a document's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// 1-based position in the document's log.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_permission_level: u32,
    pub action: AuditAction,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> ProposalDocument {
        ProposalDocument::new(
            "P1",
            "Title",
            NarrativeSections::default(),
            VoteAnalysis::default(),
            CommentAnalysis::default(),
            Actor::new("m-1", "Manager", 6),
        )
    }

    #[test]
    fn test_new_document_is_draft() {
        let doc = document();
        assert!(doc.id.starts_with("doc_"));
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(!doc.committee_eligible);
        assert!(doc.target_committee.is_none());
        assert!(doc.submitted_at.is_none());
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(generate_document_id(), generate_document_id());
    }

    #[test]
    fn test_status_editable() {
        assert!(DocumentStatus::Draft.is_editable());
        assert!(DocumentStatus::UnderReview.is_editable());
        assert!(!DocumentStatus::Ready.is_editable());
        assert!(!DocumentStatus::Submitted.is_editable());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&DocumentStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        assert_eq!(
            "submitted".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::Submitted
        );
        assert!("archived".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_vote_analysis_rates() {
        let analysis = VoteAnalysis::from(VoteCount::new(45, 3, 2));
        assert_eq!(analysis.total_votes, 50);
        assert_eq!(analysis.support_rate, 90.0);
        assert_eq!(analysis.opposition_rate, 4.0);
    }

    #[test]
    fn test_vote_analysis_no_votes() {
        let analysis = VoteAnalysis::from(VoteCount::default());
        assert_eq!(analysis.total_votes, 0);
        assert_eq!(analysis.support_rate, 0.0);
    }

    #[test]
    fn test_vote_analysis_saturated_tally() {
        let analysis = VoteAnalysis::from(VoteCount::new(u32::MAX, 1, 0));
        assert_eq!(analysis.total_votes, u64::from(u32::MAX) + 1);
        assert_eq!(analysis.support_rate, 100.0);
        assert_eq!(analysis.opposition_rate, 0.0);
    }

    #[test]
    fn test_apply_annotation_partial() {
        let mut doc = document();
        doc.apply_annotation(&ManagerAnnotation {
            manager_notes: Some("first".to_string()),
            recommendation_level: Some(RecommendationLevel::Recommend),
            ..Default::default()
        });
        doc.apply_annotation(&ManagerAnnotation {
            additional_context: Some("context".to_string()),
            ..Default::default()
        });

        assert_eq!(doc.manager_notes.as_deref(), Some("first"));
        assert_eq!(doc.additional_context.as_deref(), Some("context"));
        assert_eq!(
            doc.recommendation_level,
            Some(RecommendationLevel::Recommend)
        );
    }

    #[test]
    fn test_annotation_field_names() {
        let annotation = ManagerAnnotation {
            manager_notes: Some("n".to_string()),
            recommendation_level: Some(RecommendationLevel::Neutral),
            ..Default::default()
        };
        assert_eq!(
            annotation.field_names(),
            vec!["manager_notes", "recommendation_level"]
        );
        assert!(ManagerAnnotation::default().is_empty());
    }

    #[test]
    fn test_audit_action_wire_name() {
        let json = serde_json::to_string(&AuditAction::MarkedReady).unwrap();
        assert_eq!(json, "\"marked_ready\"");
        assert_eq!(AuditAction::DocumentCreated.to_string(), "document_created");
    }
}
