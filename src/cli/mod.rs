//! CLI commands for the agenda workflow.
//!
//! This module provides CLI commands, organized into:
//! - **Review commands**: proposal, review (score feed and gate decisions)
//! - **Document commands**: document (generation, annotation, readiness)
//! - **Submission commands**: submission (committee handshake)
//! - **Utility commands**: config

use serde::Serialize;

use crate::core::Actor;
use crate::error::{exit_codes, AgendaError, Result};

// Review commands
pub mod proposal;
pub mod review;

// Document commands
pub mod document;

// Submission commands
pub mod submission;

// Utility commands
pub mod config_cmd;

pub use config_cmd::ConfigCommand;
pub use document::DocumentCommand;
pub use proposal::ProposalCommand;
pub use review::ReviewCommand;
pub use submission::SubmissionCommand;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Why a command failed, as reported to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandFailure {
    /// HTTP-style status (400, 403, 404, 409, 500).
    pub status: u16,
    /// Error message.
    pub message: String,
    /// Process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl From<&AgendaError> for CommandFailure {
    fn from(err: &AgendaError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
            exit_code: err.exit_code(),
        }
    }
}

/// Output for a command that failed before reaching its handler.
#[derive(Debug, Clone, Serialize)]
pub struct FailureOutput {
    pub success: bool,
    pub error: CommandFailure,
}

impl FailureOutput {
    /// Wrap an error.
    pub fn new(err: &AgendaError) -> Self {
        Self {
            success: false,
            error: CommandFailure::from(err),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, options: &OutputOptions) -> String {
        render(self, options, |o| format!("Error: {}\n", o.error.message))
    }
}

/// Exit code for an optional failure.
pub fn exit_code(error: Option<&CommandFailure>) -> i32 {
    error.map(|e| e.exit_code).unwrap_or(exit_codes::SUCCESS)
}

/// Render an output as JSON, nothing (quiet), or human-readable text.
pub fn render<T: Serialize>(
    output: &T,
    options: &OutputOptions,
    human: impl FnOnce(&T) -> String,
) -> String {
    if options.quiet {
        return String::new();
    }

    if options.json {
        serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
    } else {
        human(output)
    }
}

/// Build the calling actor from the out-of-band identity flags.
///
/// The display name defaults to the id; a missing level is the lowest rank.
pub fn resolve_actor(id: Option<&str>, name: Option<&str>, level: Option<u32>) -> Result<Actor> {
    let id = id.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        AgendaError::validation("actor id is required (--actor-id or AGENDA_ACTOR_ID)")
    })?;
    let name = name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(id);
    Ok(Actor::new(id, name, level.unwrap_or(0)))
}
