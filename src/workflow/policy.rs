//! Permission policy.
//!
//! Every mutating workflow operation asks the policy first, before any input
//! validation or state lookup.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PermissionsConfig;
use crate::core::Actor;
use crate::error::{AgendaError, Result};

/// Operations subject to a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DepartmentReview,
    FacilityReview,
    GenerateDocument,
    AnnotateDocument,
    ReviewDocument,
    MarkReady,
    RequestSubmission,
    ApproveSubmission,
    RejectSubmission,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DepartmentReview => "department_review",
            Operation::FacilityReview => "facility_review",
            Operation::GenerateDocument => "generate_document",
            Operation::AnnotateDocument => "annotate_document",
            Operation::ReviewDocument => "review_document",
            Operation::MarkReady => "mark_ready",
            Operation::RequestSubmission => "request_submission",
            Operation::ApproveSubmission => "approve_submission",
            Operation::RejectSubmission => "reject_submission",
        }
    }

    /// Verb used in denial messages.
    fn verb(&self) -> &'static str {
        match self {
            Operation::DepartmentReview => "decide at the department gate",
            Operation::FacilityReview => "decide at the facility gate",
            Operation::GenerateDocument => "generate documents",
            Operation::AnnotateDocument => "annotate documents",
            Operation::ReviewDocument => "move documents in and out of review",
            Operation::MarkReady => "mark documents ready",
            Operation::RequestSubmission => "request submission",
            Operation::ApproveSubmission => "approve",
            Operation::RejectSubmission => "reject",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    /// Denied, with the message returned to the caller.
    Deny(String),
}

impl PolicyDecision {
    /// Check if the operation is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }
}

/// Maps operations to minimum permission levels.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    permissions: PermissionsConfig,
}

impl PermissionPolicy {
    /// Create a policy from configured minimum levels.
    pub fn new(permissions: PermissionsConfig) -> Self {
        Self { permissions }
    }

    /// Minimum permission level for an operation.
    pub fn required_level(&self, operation: Operation) -> u32 {
        let p = &self.permissions;
        match operation {
            Operation::DepartmentReview => p.department_review,
            Operation::FacilityReview => p.facility_review,
            Operation::GenerateDocument
            | Operation::AnnotateDocument
            | Operation::ReviewDocument
            | Operation::MarkReady => p.manage_document,
            Operation::RequestSubmission => p.request_submission,
            Operation::ApproveSubmission | Operation::RejectSubmission => p.approve_submission,
        }
    }

    /// Evaluate whether a permission level may perform an operation.
    pub fn evaluate(&self, level: u32, operation: Operation) -> PolicyDecision {
        let required = self.required_level(operation);
        if level >= required {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Deny(format!("Level {}+ required to {}", required, operation.verb()))
        }
    }

    /// Authorize an actor, failing with `InsufficientPermission` on denial.
    pub fn authorize(&self, actor: &Actor, operation: Operation) -> Result<()> {
        match self.evaluate(actor.permission_level, operation) {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Deny(message) => {
                warn!(
                    actor = %actor.id,
                    level = actor.permission_level,
                    operation = %operation,
                    "Permission denied"
                );
                Err(AgendaError::insufficient_permission(message))
            }
        }
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::new(PermissionsConfig::default())
    }
}
