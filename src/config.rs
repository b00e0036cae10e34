//! Configuration loading for the agenda workflow.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.agenda/config.toml`)
//! 3. User config (`~/.agenda/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The defaults encode the organization's
//! standard thresholds (50 / 100) and permission levels (5 / 8 / 7 / 8).

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AgendaError, Result};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Score thresholds that open the review gates.
    pub gates: GatesConfig,
    /// Minimum permission level per operation.
    pub permissions: PermissionsConfig,
    /// Input validation rules.
    pub validation: ValidationConfig,
    /// Committee destinations.
    pub committees: CommitteesConfig,
    /// Where workflow state is persisted.
    pub storage: StorageConfig,
}

/// Score thresholds for the two review gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatesConfig {
    /// Score at which a pending proposal enters department review.
    pub department_score: u32,
    /// Score at which the facility gate opens.
    pub facility_score: u32,
}

impl GatesConfig {
    /// The facility threshold must sit strictly above the department one,
    /// otherwise gate 2 could open before gate 1.
    pub fn is_valid(department_score: u32, facility_score: u32) -> bool {
        department_score > 0 && facility_score > department_score
    }
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            department_score: 50,
            facility_score: 100,
        }
    }
}

/// Minimum permission levels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Department gate decisions.
    pub department_review: u32,
    /// Facility gate decisions.
    pub facility_review: u32,
    /// Opening a committee submission request.
    pub request_submission: u32,
    /// Approving or rejecting a submission request.
    pub approve_submission: u32,
    /// Generating, annotating, and marking documents ready.
    pub manage_document: u32,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            department_review: 5,
            facility_review: 8,
            request_submission: 7,
            approve_submission: 8,
            manage_document: 5,
        }
    }
}

/// Input validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum length of a review decision reason, in characters.
    pub min_reason_chars: usize,
}

/// Minimum valid min_reason_chars value.
pub const MIN_REASON_CHARS_FLOOR: usize = 1;

impl ValidationConfig {
    /// Check if a min_reason_chars value is valid (must be >= 1).
    pub fn is_valid_min_reason_chars(value: usize) -> bool {
        value >= MIN_REASON_CHARS_FLOOR
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_reason_chars: 10,
        }
    }
}

/// Committee destinations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommitteesConfig {
    /// Allow-list of committee names. Empty accepts any non-blank name.
    pub allowed: Vec<String>,
}

impl CommitteesConfig {
    /// Check whether a committee name is an accepted destination.
    pub fn accepts(&self, committee: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|c| c == committee)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit path of the state file. Defaults to `<agenda_home>/state.json`.
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.agenda/config.toml` in cwd or an ancestor)
    /// 3. User config (`~/.agenda/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.agenda/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = agenda_home()?;
        let config_path = home.join("config.toml");
        Self::load_from_file(&config_path).ok()
    }

    /// Load project config from `.agenda/config.toml` under the project root.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = project_agenda_dir(cwd).join("config.toml");
        if !config_path.exists() {
            return None;
        }
        match Self::load_from_file(&config_path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %config_path.display(), "ignoring project config: {}", e);
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| AgendaError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| AgendaError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // AGENDA_DEPARTMENT_SCORE / AGENDA_FACILITY_SCORE are validated as a pair
        let department = env_u32("AGENDA_DEPARTMENT_SCORE").unwrap_or(self.gates.department_score);
        let facility = env_u32("AGENDA_FACILITY_SCORE").unwrap_or(self.gates.facility_score);
        if GatesConfig::is_valid(department, facility) {
            self.gates.department_score = department;
            self.gates.facility_score = facility;
        } else {
            tracing::warn!(
                department,
                facility,
                "invalid gate thresholds from environment (facility must exceed department), keeping {}/{}",
                self.gates.department_score,
                self.gates.facility_score
            );
        }

        if let Some(n) = env_u32("AGENDA_DEPARTMENT_REVIEW_LEVEL") {
            self.permissions.department_review = n;
        }
        if let Some(n) = env_u32("AGENDA_FACILITY_REVIEW_LEVEL") {
            self.permissions.facility_review = n;
        }
        if let Some(n) = env_u32("AGENDA_REQUEST_SUBMISSION_LEVEL") {
            self.permissions.request_submission = n;
        }
        if let Some(n) = env_u32("AGENDA_APPROVE_SUBMISSION_LEVEL") {
            self.permissions.approve_submission = n;
        }
        if let Some(n) = env_u32("AGENDA_MANAGE_DOCUMENT_LEVEL") {
            self.permissions.manage_document = n;
        }

        // AGENDA_MIN_REASON_CHARS
        if let Ok(val) = env::var("AGENDA_MIN_REASON_CHARS") {
            match val.parse::<usize>() {
                Ok(n) if ValidationConfig::is_valid_min_reason_chars(n) => {
                    self.validation.min_reason_chars = n;
                }
                _ => tracing::warn!(
                    "Invalid AGENDA_MIN_REASON_CHARS value '{}'. Must be >= {}. Using '{}'.",
                    val,
                    MIN_REASON_CHARS_FLOOR,
                    self.validation.min_reason_chars
                ),
            }
        }

        // AGENDA_COMMITTEES (comma separated)
        if let Ok(val) = env::var("AGENDA_COMMITTEES") {
            self.committees.allowed = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        // AGENDA_STATE_FILE
        if let Ok(val) = env::var("AGENDA_STATE_FILE") {
            if val.is_empty() {
                tracing::warn!("AGENDA_STATE_FILE is empty, ignoring");
            } else {
                self.storage.state_file = Some(PathBuf::from(val));
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence field by field: every value in
    /// `other` that differs from the default replaces the value in `self`.
    ///
    /// # Limitation
    ///
    /// A layer cannot set a value back to its default to undo a lower layer,
    /// because "unset" and "explicitly default" are indistinguishable here.
    fn merge(mut self, other: Config) -> Self {
        let default_gates = GatesConfig::default();
        let mut department = self.gates.department_score;
        let mut facility = self.gates.facility_score;
        if other.gates.department_score != default_gates.department_score {
            department = other.gates.department_score;
        }
        if other.gates.facility_score != default_gates.facility_score {
            facility = other.gates.facility_score;
        }
        if GatesConfig::is_valid(department, facility) {
            self.gates.department_score = department;
            self.gates.facility_score = facility;
        } else {
            tracing::warn!(department, facility, "ignoring invalid gate thresholds");
        }

        let default_perms = PermissionsConfig::default();
        if other.permissions.department_review != default_perms.department_review {
            self.permissions.department_review = other.permissions.department_review;
        }
        if other.permissions.facility_review != default_perms.facility_review {
            self.permissions.facility_review = other.permissions.facility_review;
        }
        if other.permissions.request_submission != default_perms.request_submission {
            self.permissions.request_submission = other.permissions.request_submission;
        }
        if other.permissions.approve_submission != default_perms.approve_submission {
            self.permissions.approve_submission = other.permissions.approve_submission;
        }
        if other.permissions.manage_document != default_perms.manage_document {
            self.permissions.manage_document = other.permissions.manage_document;
        }

        let default_validation = ValidationConfig::default();
        if other.validation.min_reason_chars != default_validation.min_reason_chars
            && ValidationConfig::is_valid_min_reason_chars(other.validation.min_reason_chars)
        {
            self.validation.min_reason_chars = other.validation.min_reason_chars;
        }

        if !other.committees.allowed.is_empty() {
            self.committees.allowed = other.committees.allowed;
        }

        if other.storage.state_file.is_some() {
            self.storage.state_file = other.storage.state_file;
        }

        self
    }

    /// Report problems in a loaded configuration.
    ///
    /// Returns one message per problem; empty means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !GatesConfig::is_valid(self.gates.department_score, self.gates.facility_score) {
            problems.push(format!(
                "gates.facility_score ({}) must exceed gates.department_score ({})",
                self.gates.facility_score, self.gates.department_score
            ));
        }
        if !ValidationConfig::is_valid_min_reason_chars(self.validation.min_reason_chars) {
            problems.push(format!(
                "validation.min_reason_chars must be >= {}",
                MIN_REASON_CHARS_FLOOR
            ));
        }
        if self.permissions.approve_submission < self.permissions.request_submission {
            problems.push(format!(
                "permissions.approve_submission ({}) is below permissions.request_submission ({}); \
                 the approver would not outrank the preparer",
                self.permissions.approve_submission, self.permissions.request_submission
            ));
        }
        if self.committees.allowed.iter().any(|c| c.trim().is_empty()) {
            problems.push("committees.allowed contains a blank name".to_string());
        }

        problems
    }

    /// Resolve the state file path.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.storage
            .state_file
            .clone()
            .or_else(|| agenda_home().map(|h| h.join("state.json")))
    }

    /// Save configuration to the project config file.
    ///
    /// Writes to `.agenda/config.toml` in the given directory via temp file
    /// and rename.
    pub fn save_project(&self, cwd: &Path) -> Result<PathBuf> {
        let agenda_dir = cwd.join(".agenda");

        if !agenda_dir.exists() {
            fs::create_dir_all(&agenda_dir).map_err(|e| AgendaError::storage(&agenda_dir, e))?;
        }

        let config_path = agenda_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| AgendaError::config(e.to_string()))?;

        let temp_path = agenda_dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| AgendaError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &config_path).map_err(|e| AgendaError::storage(&config_path, e))?;

        Ok(config_path)
    }
}

/// Parse an unsigned environment variable, warning on garbage.
fn env_u32(name: &str) -> Option<u32> {
    let val = env::var(name).ok()?;
    match val.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(
                "Invalid {} value '{}'. Expected a non-negative integer.",
                name,
                val
            );
            None
        }
    }
}

/// Get the agenda home directory.
///
/// Checks `AGENDA_HOME` first, then falls back to `~/.agenda`.
pub fn agenda_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("AGENDA_HOME") {
        if home.is_empty() {
            tracing::warn!("AGENDA_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("AGENDA_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".agenda"));
    }

    let fallback = env::temp_dir().join("agenda");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Find the project root: the nearest ancestor holding an `.agenda/`
/// directory, or `cwd` itself.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    for ancestor in cwd.ancestors() {
        if ancestor.join(".agenda").is_dir() {
            return ancestor.to_path_buf();
        }
    }
    cwd.to_path_buf()
}

/// Get the project `.agenda/` directory for a working directory.
pub fn project_agenda_dir(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".agenda")
}
