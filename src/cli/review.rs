//! Review command.
//!
//! Records department and facility gate decisions, and lists the queue of
//! proposals waiting at an open gate.

use serde::Serialize;

use crate::cli::{render, CommandFailure, OutputOptions};
use crate::core::{
    Actor, AgendaLevel, CommentAnalysis, DepartmentAction, FacilityAction, ReviewGate,
};
use crate::error::Result;
use crate::storage::Repository;
use crate::workflow::{DecisionInput, DecisionOutcome, ReviewGateHandlers};

/// A gate decision as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct DecisionArgs {
    /// Action wire name, e.g. `approve_as_dept_agenda`.
    pub action: String,
    pub reason: Option<String>,
    pub comment: Option<String>,
    pub comments: CommentAnalysis,
}

impl DecisionArgs {
    fn into_input<A: std::str::FromStr<Err = crate::error::AgendaError>>(
        self,
    ) -> Result<DecisionInput<A>> {
        Ok(DecisionInput {
            action: self.action.parse()?,
            reason: self.reason,
            comment: self.comment,
            comments: self.comments,
        })
    }
}

/// One proposal waiting for a reviewer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueueEntry {
    pub proposal_id: String,
    pub gate: ReviewGate,
    pub level: AgendaLevel,
    pub score: u32,
    pub department: String,
}

/// Output format for the review command.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Decision outcome, for `department` and `facility`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DecisionOutcome>,
    /// Waiting proposals, for `queue`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queue: Vec<QueueEntry>,
    /// Error details if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

impl ReviewOutput {
    /// Create a successful decision output.
    pub fn decided(outcome: DecisionOutcome) -> Self {
        Self {
            success: true,
            outcome: Some(outcome),
            queue: Vec::new(),
            error: None,
        }
    }

    /// Create a successful queue output.
    pub fn queued(queue: Vec<QueueEntry>) -> Self {
        Self {
            success: true,
            outcome: None,
            queue,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: CommandFailure) -> Self {
        Self {
            success: false,
            outcome: None,
            queue: Vec::new(),
            error: Some(error),
        }
    }
}

/// The review command implementation.
pub struct ReviewCommand<R: Repository> {
    review: ReviewGateHandlers<R>,
}

impl<R: Repository> ReviewCommand<R> {
    /// Create a new review command.
    pub fn new(review: ReviewGateHandlers<R>) -> Self {
        Self { review }
    }

    /// Decide at the department gate.
    pub fn department(&self, post_id: &str, args: DecisionArgs, reviewer: &Actor) -> ReviewOutput {
        let result = args
            .into_input::<DepartmentAction>()
            .and_then(|input| self.review.decide_department(post_id, input, reviewer));
        match result {
            Ok(outcome) => ReviewOutput::decided(outcome),
            Err(e) => ReviewOutput::failure(CommandFailure::from(&e)),
        }
    }

    /// Decide at the facility gate.
    pub fn facility(&self, post_id: &str, args: DecisionArgs, reviewer: &Actor) -> ReviewOutput {
        let result = args
            .into_input::<FacilityAction>()
            .and_then(|input| self.review.decide_facility(post_id, input, reviewer));
        match result {
            Ok(outcome) => ReviewOutput::decided(outcome),
            Err(e) => ReviewOutput::failure(CommandFailure::from(&e)),
        }
    }

    /// List proposals waiting at an open gate.
    pub fn queue(&self, gate: Option<&str>) -> ReviewOutput {
        match self.collect_queue(gate) {
            Ok(queue) => ReviewOutput::queued(queue),
            Err(e) => ReviewOutput::failure(CommandFailure::from(&e)),
        }
    }

    fn collect_queue(&self, gate: Option<&str>) -> Result<Vec<QueueEntry>> {
        let gate = gate.map(str::parse::<ReviewGate>).transpose()?;
        Ok(self
            .review
            .pending_reviews(gate)?
            .into_iter()
            .map(|p| QueueEntry {
                gate: match p.agenda_level {
                    AgendaLevel::DeptReview => ReviewGate::Department,
                    _ => ReviewGate::Facility,
                },
                proposal_id: p.id,
                level: p.agenda_level,
                score: p.agenda_score,
                department: p.department,
            })
            .collect())
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ReviewOutput, options: &OutputOptions) -> String {
        render(output, options, format_human_readable)
    }
}

/// Format output as human-readable text.
fn format_human_readable(output: &ReviewOutput) -> String {
    if let Some(error) = &output.error {
        return format!("Review failed: {}\n", error.message);
    }

    if let Some(outcome) = &output.outcome {
        let t = &outcome.transition;
        let mut out = format!(
            "{} gate: {} ({} -> {})\n",
            t.gate,
            t.decision.action_name(),
            t.from.as_str(),
            t.to.as_str()
        );
        if let Some(doc) = &outcome.document {
            out.push_str(&format!(
                "Document {} [{}]{}\n",
                doc.id,
                doc.status.as_str(),
                if doc.committee_eligible {
                    " committee eligible"
                } else {
                    ""
                }
            ));
        }
        return out;
    }

    if output.queue.is_empty() {
        return "No proposals awaiting review.\n".to_string();
    }

    let mut out = String::new();
    for entry in &output.queue {
        out.push_str(&format!(
            "{:<10} {}  score {:>4}  {}\n",
            entry.gate.as_str(),
            entry.proposal_id,
            entry.score,
            entry.department
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::{NewProposal, VoteCount};
    use crate::storage::MemoryRepository;
    use std::sync::Arc;

    fn command() -> ReviewCommand<Arc<MemoryRepository>> {
        let review = ReviewGateHandlers::new(Arc::new(MemoryRepository::new()), Config::default());
        for (id, score) in [("P1", 60), ("P2", 20)] {
            review
                .register_proposal(NewProposal {
                    id: id.to_string(),
                    content: "夜勤の申し送りを電子化する".to_string(),
                    author_id: "u-1".to_string(),
                    author_name: "Abe".to_string(),
                    department: "Nursing".to_string(),
                    facility: "Central".to_string(),
                })
                .unwrap();
            review
                .record_score(id, score, VoteCount::new(score, 0, 0))
                .unwrap();
        }
        ReviewCommand::new(review)
    }

    fn args(action: &str) -> DecisionArgs {
        DecisionArgs {
            action: action.to_string(),
            reason: Some("申し送り時間の短縮が見込める".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_lists_open_gates_only() {
        let cmd = command();
        let output = cmd.queue(None);
        assert!(output.success);
        assert_eq!(output.queue.len(), 1);
        assert_eq!(output.queue[0].proposal_id, "P1");
        assert_eq!(output.queue[0].gate, ReviewGate::Department);

        assert!(cmd.queue(Some("facility")).queue.is_empty());
    }

    #[test]
    fn test_queue_rejects_unknown_gate() {
        let output = command().queue(Some("board"));
        assert!(!output.success);
        assert_eq!(output.error.unwrap().status, 400);
    }

    #[test]
    fn test_department_decision() {
        let cmd = command();
        let output = cmd.department(
            "P1",
            args("approve_as_dept_agenda"),
            &Actor::new("chief", "Chief", 5),
        );
        assert!(output.success, "{:?}", output.error);
        let outcome = output.outcome.unwrap();
        assert_eq!(outcome.proposal.agenda_level, AgendaLevel::DeptAgenda);
        assert!(outcome.document.is_some());
    }

    #[test]
    fn test_unknown_action_is_validation_error() {
        let cmd = command();
        let output = cmd.department("P1", args("adopt"), &Actor::new("chief", "Chief", 5));
        assert_eq!(output.error.unwrap().status, 400);
    }

    #[test]
    fn test_facility_decision_requires_level() {
        let cmd = command();
        let output = cmd.facility(
            "P1",
            args("approve_for_committee"),
            &Actor::new("chief", "Chief", 5),
        );
        assert_eq!(output.error.unwrap().status, 403);
    }

    #[test]
    fn test_format_human_readable_decision() {
        let cmd = command();
        let output = cmd.department("P1", args("reject"), &Actor::new("chief", "Chief", 5));
        let text = cmd.format_output(&output, &OutputOptions::default());
        assert!(text.contains("department gate: reject (DEPT_REVIEW -> REJECTED)"));
    }
}
