//! Proposal command.
//!
//! Mirrors proposals from the authoring subsystem and feeds scores from the
//! voting engine.

use serde::Serialize;

use crate::cli::{render, CommandFailure, OutputOptions};
use crate::core::{NewProposal, Proposal, VoteCount};
use crate::error::Result;
use crate::storage::Repository;
use crate::workflow::ReviewGateHandlers;

/// Output format for the proposal command.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Proposals affected or listed.
    pub proposals: Vec<Proposal>,
    /// Error details if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

impl ProposalOutput {
    /// Create a successful output.
    pub fn success(proposals: Vec<Proposal>) -> Self {
        Self {
            success: true,
            proposals,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: CommandFailure) -> Self {
        Self {
            success: false,
            proposals: Vec::new(),
            error: Some(error),
        }
    }

    fn from_result(result: Result<Vec<Proposal>>) -> Self {
        match result {
            Ok(proposals) => Self::success(proposals),
            Err(e) => Self::failure(CommandFailure::from(&e)),
        }
    }
}

/// The proposal command implementation.
pub struct ProposalCommand<R: Repository> {
    review: ReviewGateHandlers<R>,
}

impl<R: Repository> ProposalCommand<R> {
    /// Create a new proposal command.
    pub fn new(review: ReviewGateHandlers<R>) -> Self {
        Self { review }
    }

    /// Register a proposal at PENDING.
    pub fn register(&self, input: NewProposal) -> ProposalOutput {
        ProposalOutput::from_result(self.review.register_proposal(input).map(|p| vec![p]))
    }

    /// Record a score and vote tally.
    pub fn score(&self, id: &str, score: u32, votes: VoteCount) -> ProposalOutput {
        ProposalOutput::from_result(self.review.record_score(id, score, votes).map(|p| vec![p]))
    }

    /// Show one proposal.
    pub fn show(&self, id: &str) -> ProposalOutput {
        ProposalOutput::from_result(self.review.proposal(id).map(|p| vec![p]))
    }

    /// List all proposals.
    pub fn list(&self) -> ProposalOutput {
        ProposalOutput::from_result(self.review.proposals())
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ProposalOutput, options: &OutputOptions) -> String {
        render(output, options, format_human_readable)
    }
}

/// Format output as human-readable text.
fn format_human_readable(output: &ProposalOutput) -> String {
    if let Some(error) = &output.error {
        return format!("Proposal command failed: {}\n", error.message);
    }

    if output.proposals.is_empty() {
        return "No proposals.\n".to_string();
    }

    let mut out = String::new();
    for p in &output.proposals {
        out.push_str(&format!(
            "{}  {:<16} score {:>4}  votes {}/{}/{}  {}\n",
            p.id,
            p.agenda_level.as_str(),
            p.agenda_score,
            p.vote_count.approve,
            p.vote_count.neutral,
            p.vote_count.oppose,
            p.department
        ));
        if let Some(reason) = &p.agenda_decision_reason {
            out.push_str(&format!(
                "    last decision by {}: {}\n",
                p.agenda_decision_by.as_deref().unwrap_or("-"),
                reason
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::AgendaLevel;
    use crate::storage::MemoryRepository;
    use std::sync::Arc;

    fn command() -> ProposalCommand<Arc<MemoryRepository>> {
        ProposalCommand::new(ReviewGateHandlers::new(
            Arc::new(MemoryRepository::new()),
            Config::default(),
        ))
    }

    fn input() -> NewProposal {
        NewProposal {
            id: "P1".to_string(),
            content: "休憩室に加湿器を置く".to_string(),
            author_id: "u-1".to_string(),
            author_name: "Abe".to_string(),
            department: "Nursing".to_string(),
            facility: "Central".to_string(),
        }
    }

    #[test]
    fn test_register_and_score() {
        let cmd = command();
        assert!(cmd.register(input()).success);

        let output = cmd.score("P1", 55, VoteCount::new(50, 3, 2));
        assert!(output.success);
        assert_eq!(output.proposals[0].agenda_level, AgendaLevel::DeptReview);
    }

    #[test]
    fn test_show_unknown_fails_with_404() {
        let cmd = command();
        let output = cmd.show("P404");
        assert!(!output.success);
        assert_eq!(output.error.as_ref().unwrap().status, 404);
    }

    #[test]
    fn test_format_human_readable() {
        let cmd = command();
        cmd.register(input());
        let output = cmd.list();
        let text = cmd.format_output(&output, &OutputOptions::default());
        assert!(text.contains("P1"));
        assert!(text.contains("PENDING"));
    }

    #[test]
    fn test_format_json_failure() {
        let cmd = command();
        let output = cmd.score("P404", 1, VoteCount::default());
        let json = cmd.format_output(
            &output,
            &OutputOptions {
                json: true,
                quiet: false,
            },
        );
        assert!(json.contains("\"success\": false"));
        assert!(json.contains("\"status\": 404"));
    }
}
