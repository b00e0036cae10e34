//! Agenda - proposal escalation gates and committee submission
//!
//! Proposals climb from PENDING through two human review gates, opened by
//! score thresholds. Approved proposals get a decision document, which
//! managers annotate and a preparer submits to a committee through a
//! request/approve handshake. Every document mutation is audited.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod workflow;

pub use config::Config;
pub use core::{
    Actor, AgendaLevel, AgendaStateMachine, AuditAction, AuditEntry, DocumentStatus,
    GateDecision, Proposal, ProposalDocument, ReviewGate, SubmissionRequest, SubmissionStatus,
    Transition,
};
pub use error::{AgendaError, Result};
pub use storage::{FileRepository, MemoryRepository, Repository, WriteBatch};
pub use workflow::{
    CommitteeSubmissionCoordinator, PermissionPolicy, ProposalDocumentStore, ReviewGateHandlers,
    Workflow,
};

// CLI commands
pub use cli::{ConfigCommand, DocumentCommand, ProposalCommand, ReviewCommand, SubmissionCommand};
