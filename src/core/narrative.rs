//! Narrative synthesis for generated documents.
//!
//! Sections are assembled deterministically from the proposal and the vote
//! and comment snapshots so the same inputs always produce the same text.

use crate::core::document::{CommentAnalysis, NarrativeSections, VoteAnalysis};
use crate::core::state::Proposal;

/// Maximum title length in characters, ellipsis excluded.
pub const TITLE_MAX_CHARS: usize = 40;

/// Derive a document title from the first non-empty line of the content.
pub fn derive_title(content: &str) -> String {
    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(untitled proposal)");

    if first_line.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}…", truncated)
    } else {
        first_line.to_string()
    }
}

/// Build the six narrative sections.
pub fn synthesize(
    proposal: &Proposal,
    votes: &VoteAnalysis,
    comments: &CommentAnalysis,
) -> NarrativeSections {
    let content = proposal.content.trim();

    let summary = format!(
        "{} ({} / {}) proposed: {}",
        proposal.author_name,
        proposal.department,
        proposal.facility,
        derive_title(content)
    );

    let background = format!(
        "Raised in {} at {}. The proposal reached an agenda score of {} from {} votes.",
        proposal.department, proposal.facility, proposal.agenda_score, votes.total_votes
    );

    let objectives = content.to_string();

    let expected_effects = format!(
        "{:.1}% of voters support the proposal; {} supporting comment(s) and {} \
         improvement suggestion(s) were recorded.",
        votes.support_rate, comments.support_comments, comments.proposal_comments
    );

    let concerns = if votes.opposition_rate > 0.0 || comments.concern_comments > 0 {
        format!(
            "{:.1}% of voters oppose the proposal; {} comment(s) raised concerns.",
            votes.opposition_rate, comments.concern_comments
        )
    } else {
        "No opposition or concerns were recorded.".to_string()
    };

    let countermeasures = if comments.concern_comments > 0 {
        format!(
            "Address the {} recorded concern(s) before implementation and report back to voters.",
            comments.concern_comments
        )
    } else {
        "Monitor adoption after implementation.".to_string()
    };

    NarrativeSections {
        summary,
        background,
        objectives,
        expected_effects,
        concerns,
        countermeasures,
    }
}
