//! Proposal and agenda-level types.
//!
//! A proposal is authored and voted on elsewhere; the workflow mirrors the
//! fields it needs (score, votes) and owns the agenda level and the review
//! decisions recorded against it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::actor::Actor;
use crate::error::AgendaError;

/// Position of a proposal in the escalation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgendaLevel {
    /// Collecting votes, below the department threshold.
    #[default]
    Pending,
    /// Department threshold reached, awaiting the department gate decision.
    DeptReview,
    /// Accepted as a department agenda.
    DeptAgenda,
    /// Escalated to the facility; the facility gate decides from here.
    FacilityAgenda,
    /// Corporate review (reserved; no gate in this workflow enters it).
    CorpReview,
    /// Corporate agenda (reserved).
    CorpAgenda,
    /// Rejected at a gate.
    Rejected,
}

impl AgendaLevel {
    /// All levels in pipeline order.
    pub const ALL: [AgendaLevel; 7] = [
        AgendaLevel::Pending,
        AgendaLevel::DeptReview,
        AgendaLevel::DeptAgenda,
        AgendaLevel::FacilityAgenda,
        AgendaLevel::CorpReview,
        AgendaLevel::CorpAgenda,
        AgendaLevel::Rejected,
    ];

    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaLevel::Pending => "PENDING",
            AgendaLevel::DeptReview => "DEPT_REVIEW",
            AgendaLevel::DeptAgenda => "DEPT_AGENDA",
            AgendaLevel::FacilityAgenda => "FACILITY_AGENDA",
            AgendaLevel::CorpReview => "CORP_REVIEW",
            AgendaLevel::CorpAgenda => "CORP_AGENDA",
            AgendaLevel::Rejected => "REJECTED",
        }
    }

    /// Pipeline rank; `Rejected` has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            AgendaLevel::Pending => Some(0),
            AgendaLevel::DeptReview => Some(1),
            AgendaLevel::DeptAgenda => Some(2),
            AgendaLevel::FacilityAgenda => Some(3),
            AgendaLevel::CorpReview => Some(4),
            AgendaLevel::CorpAgenda => Some(5),
            AgendaLevel::Rejected => None,
        }
    }

    /// Check if no further transition can leave this level.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgendaLevel::Rejected | AgendaLevel::CorpAgenda)
    }

    /// Check if the proposal has been accepted at some organizational level.
    pub fn is_agenda(&self) -> bool {
        matches!(
            self,
            AgendaLevel::DeptAgenda | AgendaLevel::FacilityAgenda | AgendaLevel::CorpAgenda
        )
    }
}

impl fmt::Display for AgendaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgendaLevel {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgendaLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AgendaError::validation(format!("unknown agenda level: {}", s)))
    }
}

/// The two human review gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGate {
    /// Gate 1, opened by the department threshold.
    Department,
    /// Gate 2, opened by the facility threshold.
    Facility,
}

impl ReviewGate {
    /// Wire name of the gate.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewGate::Department => "department",
            ReviewGate::Facility => "facility",
        }
    }
}

impl fmt::Display for ReviewGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewGate {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "department" | "dept" | "1" => Ok(ReviewGate::Department),
            "facility" | "2" => Ok(ReviewGate::Facility),
            other => Err(AgendaError::validation(format!("unknown gate: {}", other))),
        }
    }
}

/// Decisions available at the department gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentAction {
    /// Adopt as a department agenda.
    ApproveAsDeptAgenda,
    /// Hand over to the facility gate.
    EscalateToFacility,
    /// Reject the proposal.
    Reject,
}

impl DepartmentAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            DepartmentAction::ApproveAsDeptAgenda => "approve_as_dept_agenda",
            DepartmentAction::EscalateToFacility => "escalate_to_facility",
            DepartmentAction::Reject => "reject",
        }
    }
}

impl FromStr for DepartmentAction {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve_as_dept_agenda" => Ok(DepartmentAction::ApproveAsDeptAgenda),
            "escalate_to_facility" => Ok(DepartmentAction::EscalateToFacility),
            "reject" => Ok(DepartmentAction::Reject),
            other => Err(AgendaError::validation(format!(
                "unknown department gate action: {}",
                other
            ))),
        }
    }
}

/// Decisions available at the facility gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityAction {
    /// Clear the proposal's document for committee submission.
    ApproveForCommittee,
    /// Reject the proposal.
    Reject,
}

impl FacilityAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityAction::ApproveForCommittee => "approve_for_committee",
            FacilityAction::Reject => "reject",
        }
    }
}

impl FromStr for FacilityAction {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve_for_committee" => Ok(FacilityAction::ApproveForCommittee),
            "reject" => Ok(FacilityAction::Reject),
            other => Err(AgendaError::validation(format!(
                "unknown facility gate action: {}",
                other
            ))),
        }
    }
}

/// A reviewer decision, tagged by the gate it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "gate", content = "action", rename_all = "snake_case")]
pub enum GateDecision {
    Department(DepartmentAction),
    Facility(FacilityAction),
}

impl GateDecision {
    /// The gate this decision is made at.
    pub fn gate(&self) -> ReviewGate {
        match self {
            GateDecision::Department(_) => ReviewGate::Department,
            GateDecision::Facility(_) => ReviewGate::Facility,
        }
    }

    /// Wire name of the action.
    pub fn action_name(&self) -> &'static str {
        match self {
            GateDecision::Department(action) => action.as_str(),
            GateDecision::Facility(action) => action.as_str(),
        }
    }

    /// Check if the decision moves the proposal forward (not a rejection).
    pub fn is_approval(&self) -> bool {
        !matches!(
            self,
            GateDecision::Department(DepartmentAction::Reject)
                | GateDecision::Facility(FacilityAction::Reject)
        )
    }
}

/// Vote tally reported by the voting engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteCount {
    pub approve: u32,
    pub neutral: u32,
    pub oppose: u32,
}

impl VoteCount {
    /// Create a vote tally.
    pub fn new(approve: u32, neutral: u32, oppose: u32) -> Self {
        Self {
            approve,
            neutral,
            oppose,
        }
    }

    /// Total number of votes cast. Widened so full `u32` tallies cannot overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.approve) + u64::from(self.neutral) + u64::from(self.oppose)
    }
}

/// A recorded gate decision. At most one exists per (proposal, gate).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateDecisionRecord {
    /// The decision taken.
    pub decision: GateDecision,
    /// Reviewer's justification.
    pub reason: String,
    /// Optional free-form remark.
    pub comment: Option<String>,
    /// Who decided.
    pub decided_by: Actor,
    /// When the decision was recorded.
    pub decided_at: DateTime<Utc>,
    /// Level before the decision.
    pub from_level: AgendaLevel,
    /// Level after the decision.
    pub to_level: AgendaLevel,
    /// Score at decision time.
    pub score_at_decision: u32,
}

/// Fields supplied when mirroring a proposal from the authoring subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProposal {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub department: String,
    pub facility: String,
}

/// An employee-authored proposal as seen by the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    /// Proposal identifier (the post id).
    pub id: String,
    /// Proposal body.
    pub content: String,
    /// Author's user id.
    pub author_id: String,
    /// Author's display name.
    pub author_name: String,
    /// Originating department.
    pub department: String,
    /// Originating facility.
    pub facility: String,
    /// Score reported by the voting engine; never decreases.
    pub agenda_score: u32,
    /// Current pipeline position.
    pub agenda_level: AgendaLevel,
    /// Latest vote tally.
    pub vote_count: VoteCount,
    /// Reason of the most recent review decision.
    pub agenda_decision_reason: Option<String>,
    /// Reviewer id of the most recent review decision.
    pub agenda_decision_by: Option<String>,
    /// Time of the most recent review decision.
    pub agenda_decision_at: Option<DateTime<Utc>>,
    /// Decision history, one entry per gate at most.
    #[serde(default)]
    pub decisions: Vec<GateDecisionRecord>,
    /// When the proposal was registered.
    pub created_at: DateTime<Utc>,
    /// When the proposal was last changed.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: u64,
}

impl Proposal {
    /// Create a new proposal at `PENDING` with no votes.
    pub fn new(input: NewProposal) -> Self {
        let now = Utc::now();
        Self {
            id: input.id,
            content: input.content,
            author_id: input.author_id,
            author_name: input.author_name,
            department: input.department,
            facility: input.facility,
            agenda_score: 0,
            agenda_level: AgendaLevel::Pending,
            vote_count: VoteCount::default(),
            agenda_decision_reason: None,
            agenda_decision_by: None,
            agenda_decision_at: None,
            decisions: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The recorded decision for a gate, if any.
    pub fn decision_for(&self, gate: ReviewGate) -> Option<&GateDecisionRecord> {
        self.decisions.iter().find(|d| d.decision.gate() == gate)
    }

    /// Update the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
