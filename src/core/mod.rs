//! Core types and logic for the agenda workflow.
//!
//! This module contains the agenda state machine, the proposal, document and
//! submission entities, and the caller identity they are stamped with.

pub mod actor;
pub mod document;
pub mod gate;
pub mod narrative;
pub mod state;
pub mod submission;

pub use actor::Actor;
pub use document::{
    AuditAction, AuditEntry, CommentAnalysis, DocumentStatus, ManagerAnnotation,
    NarrativeSections, ProposalDocument, RecommendationLevel, VoteAnalysis,
};
pub use gate::{
    check_gate, next_level, open_gate, validate_reason, AgendaStateMachine, Transition,
};
pub use state::{
    AgendaLevel, DepartmentAction, FacilityAction, GateDecision, GateDecisionRecord,
    NewProposal, Proposal, ReviewGate, VoteCount,
};
pub use submission::{SubmissionRequest, SubmissionStatus};
