//! Review gate handlers.
//!
//! The two human entry points into the agenda state machine, plus the score
//! feed from the voting engine. Approval paths generate or update the
//! proposal's document in the same commit as the level change.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::core::{
    open_gate, Actor, AgendaStateMachine, CommentAnalysis, DepartmentAction, FacilityAction,
    GateDecision, NewProposal, Proposal, ProposalDocument, ReviewGate, Transition, VoteCount,
};
use crate::error::{AgendaError, Result};
use crate::storage::{Repository, WriteBatch};
use crate::workflow::documents::ProposalDocumentStore;
use crate::workflow::policy::{Operation, PermissionPolicy};

/// A reviewer's decision request at one of the gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionInput<A> {
    pub action: A,
    /// Justification, at least the configured number of characters.
    pub reason: Option<String>,
    pub comment: Option<String>,
    /// Comment snapshot used if the decision generates the document.
    #[serde(default)]
    pub comments: CommentAnalysis,
}

impl<A> DecisionInput<A> {
    /// Create a decision input with a reason.
    pub fn new(action: A, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: Some(reason.into()),
            comment: None,
            comments: CommentAnalysis::default(),
        }
    }

    /// Attach a free-form comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach the comment snapshot.
    pub fn with_comments(mut self, comments: CommentAnalysis) -> Self {
        self.comments = comments;
        self
    }
}

/// Result of a successful gate decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub proposal: Proposal,
    pub transition: Transition,
    /// The proposal's document after the decision, if it has one.
    pub document: Option<ProposalDocument>,
}

/// Entry points for the department and facility review gates.
#[derive(Debug, Clone)]
pub struct ReviewGateHandlers<R: Repository> {
    repo: R,
    config: Config,
    policy: PermissionPolicy,
    documents: ProposalDocumentStore<R>,
}

impl<R: Repository + Clone> ReviewGateHandlers<R> {
    /// Create review handlers over a repository.
    pub fn new(repo: R, config: Config) -> Self {
        Self {
            documents: ProposalDocumentStore::new(repo.clone(), &config),
            policy: PermissionPolicy::new(config.permissions.clone()),
            repo,
            config,
        }
    }
}

impl<R: Repository> ReviewGateHandlers<R> {
    // =========================================================================
    // Score feed
    // =========================================================================

    /// Mirror a proposal from the authoring subsystem at `PENDING`.
    pub fn register_proposal(&self, input: NewProposal) -> Result<Proposal> {
        if input.id.trim().is_empty() {
            return Err(AgendaError::validation("proposal id is required"));
        }
        if input.content.trim().is_empty() {
            return Err(AgendaError::validation("proposal content is required"));
        }
        if self.repo.proposal(&input.id)?.is_some() {
            return Err(AgendaError::conflict(format!(
                "proposal {} is already registered",
                input.id
            )));
        }

        let mut proposal = Proposal::new(input);
        let mut batch = WriteBatch::new();
        batch.put_proposal(&mut proposal);
        self.repo.commit(batch)?;

        info!(proposal = %proposal.id, "Registered proposal");
        Ok(proposal)
    }

    /// Record a score reported by the voting engine.
    pub fn record_score(&self, proposal_id: &str, score: u32, votes: VoteCount) -> Result<Proposal> {
        let mut proposal = self.proposal(proposal_id)?;

        let changed =
            AgendaStateMachine::new(&mut proposal, &self.config).record_score(score, votes)?;

        let mut batch = WriteBatch::new();
        batch.put_proposal(&mut proposal);
        self.repo.commit(batch)?;

        match changed {
            Some(level) => info!(
                proposal = %proposal.id,
                score,
                level = %level,
                "Score opened the department gate"
            ),
            None => debug!(proposal = %proposal.id, score, "Recorded score"),
        }
        Ok(proposal)
    }

    // =========================================================================
    // Gate decisions
    // =========================================================================

    /// Gate 1: department review.
    pub fn decide_department(
        &self,
        post_id: &str,
        input: DecisionInput<DepartmentAction>,
        reviewer: &Actor,
    ) -> Result<DecisionOutcome> {
        self.policy.authorize(reviewer, Operation::DepartmentReview)?;
        let DecisionInput {
            action,
            reason,
            comment,
            comments,
        } = input;
        self.decide(
            post_id,
            GateDecision::Department(action),
            reason,
            comment,
            comments,
            reviewer,
        )
    }

    /// Gate 2: facility review.
    pub fn decide_facility(
        &self,
        post_id: &str,
        input: DecisionInput<FacilityAction>,
        reviewer: &Actor,
    ) -> Result<DecisionOutcome> {
        self.policy.authorize(reviewer, Operation::FacilityReview)?;
        let DecisionInput {
            action,
            reason,
            comment,
            comments,
        } = input;
        self.decide(
            post_id,
            GateDecision::Facility(action),
            reason,
            comment,
            comments,
            reviewer,
        )
    }

    fn decide(
        &self,
        post_id: &str,
        decision: GateDecision,
        reason: Option<String>,
        comment: Option<String>,
        comments: CommentAnalysis,
        reviewer: &Actor,
    ) -> Result<DecisionOutcome> {
        let mut proposal = self.proposal(post_id)?;

        let transition = AgendaStateMachine::new(&mut proposal, &self.config).decide(
            decision,
            reason.as_deref(),
            comment.as_deref(),
            reviewer,
        )?;

        let mut batch = WriteBatch::new();
        batch.put_proposal(&mut proposal);

        let existing = self.repo.document_for_proposal(&proposal.id)?;
        let document = if decision.is_approval() {
            Some(match existing {
                Some(mut document) => {
                    if transition.committee_eligible && !document.committee_eligible {
                        self.documents
                            .stage_committee_eligible(&mut batch, &mut document, reviewer);
                    }
                    document
                }
                None => self.documents.stage_generate(
                    &mut batch,
                    &proposal,
                    comments,
                    reviewer,
                    transition.committee_eligible,
                ),
            })
        } else {
            existing
        };

        self.repo.commit(batch)?;

        info!(
            proposal = %proposal.id,
            gate = %transition.gate,
            action = decision.action_name(),
            from = %transition.from,
            to = %transition.to,
            reviewer = %reviewer.id,
            "Recorded review decision"
        );

        Ok(DecisionOutcome {
            proposal,
            transition,
            document,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a proposal by id.
    pub fn proposal(&self, proposal_id: &str) -> Result<Proposal> {
        self.repo
            .proposal(proposal_id)?
            .ok_or_else(|| AgendaError::not_found("proposal", proposal_id))
    }

    /// All proposals, highest score first.
    pub fn proposals(&self) -> Result<Vec<Proposal>> {
        let mut proposals = self.repo.proposals()?;
        proposals.sort_by(|a, b| {
            b.agenda_score
                .cmp(&a.agenda_score)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(proposals)
    }

    /// Proposals awaiting a decision, optionally at one gate only.
    pub fn pending_reviews(&self, gate: Option<ReviewGate>) -> Result<Vec<Proposal>> {
        Ok(self
            .proposals()?
            .into_iter()
            .filter(|p| match open_gate(p, &self.config) {
                Some(open) => gate.map(|g| g == open).unwrap_or(true),
                None => false,
            })
            .collect())
    }
}
