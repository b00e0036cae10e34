//! Config command.
//!
//! Shows the effective configuration and writes a project config file.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::{render, CommandFailure, OutputOptions};
use crate::config::Config;

/// Output format for the config command.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutput {
    /// Whether the command succeeded.
    pub success: bool,
    /// Effective configuration.
    pub config: Config,
    /// Resolved state file.
    pub state_file: Option<PathBuf>,
    /// Problems found by validation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
    /// Config file written, for `init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<PathBuf>,
    /// Error details if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandFailure>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
}

impl ConfigCommand {
    /// Create a new config command over the effective configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Show the effective configuration. Fails when validation finds problems.
    pub fn show(&self) -> ConfigOutput {
        let problems = self.config.validate();
        let error = if problems.is_empty() {
            None
        } else {
            Some(CommandFailure::from(&crate::error::AgendaError::config(
                format!("{} problem(s) in configuration", problems.len()),
            )))
        };
        ConfigOutput {
            success: error.is_none(),
            config: self.config.clone(),
            state_file: self.config.state_file(),
            problems,
            written: None,
            error,
        }
    }

    /// Write the effective configuration to `.agenda/config.toml` under `cwd`.
    pub fn init(&self, cwd: &Path) -> ConfigOutput {
        let mut output = self.show();
        if !output.success {
            return output;
        }
        match self.config.save_project(cwd) {
            Ok(path) => output.written = Some(path),
            Err(e) => {
                output.success = false;
                output.error = Some(CommandFailure::from(&e));
            }
        }
        output
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ConfigOutput, options: &OutputOptions) -> String {
        render(output, options, format_human_readable)
    }
}

/// Format output as human-readable text.
fn format_human_readable(output: &ConfigOutput) -> String {
    let mut out = String::new();
    let c = &output.config;

    out.push_str(&format!(
        "Gates: department >= {}, facility >= {}\n",
        c.gates.department_score, c.gates.facility_score
    ));
    out.push_str(&format!(
        "Permissions: department review {}, facility review {}, request {}, approve {}, documents {}\n",
        c.permissions.department_review,
        c.permissions.facility_review,
        c.permissions.request_submission,
        c.permissions.approve_submission,
        c.permissions.manage_document
    ));
    out.push_str(&format!(
        "Reasons: at least {} characters\n",
        c.validation.min_reason_chars
    ));
    if c.committees.allowed.is_empty() {
        out.push_str("Committees: any\n");
    } else {
        out.push_str(&format!("Committees: {}\n", c.committees.allowed.join(", ")));
    }
    match &output.state_file {
        Some(path) => out.push_str(&format!("State file: {}\n", path.display())),
        None => out.push_str("State file: (unresolved)\n"),
    }

    for problem in &output.problems {
        out.push_str(&format!("Problem: {}\n", problem));
    }
    if let Some(path) = &output.written {
        out.push_str(&format!("Wrote {}\n", path.display()));
    }
    if let Some(error) = &output.error {
        out.push_str(&format!("Config command failed: {}\n", error.message));
    }
    out
}
