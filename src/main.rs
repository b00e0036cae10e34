//! Agenda - proposal escalation gates and committee submission
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agenda::cli::config_cmd::ConfigCommand;
use agenda::cli::document::{DocumentCommand, DocumentOutput};
use agenda::cli::proposal::ProposalCommand;
use agenda::cli::review::{DecisionArgs, ReviewCommand, ReviewOutput};
use agenda::cli::submission::{RequestFilter, SubmissionCommand, SubmissionOutput};
use agenda::cli::{self, resolve_actor, FailureOutput, OutputOptions};
use agenda::config::{agenda_home, Config};
use agenda::core::{
    Actor, CommentAnalysis, ManagerAnnotation, NewProposal, RecommendationLevel, VoteCount,
};
use agenda::error::{exit_codes, AgendaError};
use agenda::storage::FileRepository;
use agenda::workflow::Workflow;

// =============================================================================
// CLI Definition
// =============================================================================

/// Agenda - proposal escalation gates and committee submission
#[derive(Parser)]
#[command(name = "agenda")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Caller identity and output flags, accepted on every subcommand.
#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// Id of the acting user
    #[arg(long, global = true, env = "AGENDA_ACTOR_ID")]
    actor_id: Option<String>,
    /// Display name of the acting user (defaults to the id)
    #[arg(long, global = true, env = "AGENDA_ACTOR_NAME")]
    actor_name: Option<String>,
    /// Permission level of the acting user
    #[arg(long, global = true, env = "AGENDA_ACTOR_LEVEL")]
    level: Option<u32>,
    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,
    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,
}

impl GlobalArgs {
    fn options(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    fn actor(&self) -> Result<Actor, AgendaError> {
        resolve_actor(
            self.actor_id.as_deref(),
            self.actor_name.as_deref(),
            self.level,
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// [Feed] Register proposals and record scores
    Proposal {
        #[command(subcommand)]
        action: ProposalAction,
    },

    /// [Reviewer] Decide at the department or facility gate
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// [Manager] Generate, annotate and prepare decision documents
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// [Preparer/Approver] Committee submission requests
    Submission {
        #[command(subcommand)]
        action: SubmissionAction,
    },

    /// [User] Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProposalAction {
    /// Register a proposal at PENDING
    Register {
        /// Proposal id
        id: String,
        /// Proposal text
        #[arg(long)]
        content: String,
        /// Author id
        #[arg(long)]
        author_id: String,
        /// Author display name (defaults to the id)
        #[arg(long)]
        author_name: Option<String>,
        /// Department the proposal belongs to
        #[arg(long)]
        department: String,
        /// Facility the proposal belongs to
        #[arg(long)]
        facility: String,
    },
    /// Record a score and vote tally
    Score {
        /// Proposal id
        id: String,
        /// Agenda score
        score: u32,
        #[arg(long, default_value_t = 0)]
        approve: u32,
        #[arg(long, default_value_t = 0)]
        neutral: u32,
        #[arg(long, default_value_t = 0)]
        oppose: u32,
    },
    /// Show a proposal
    Show {
        /// Proposal id
        id: String,
    },
    /// List proposals, highest score first
    List,
}

/// Comment snapshot flags used when a document is generated.
#[derive(Args, Debug, Clone, Copy, Default)]
struct CommentArgs {
    /// Total comments on the proposal
    #[arg(long, default_value_t = 0)]
    comments_total: u32,
    /// Supporting comments
    #[arg(long, default_value_t = 0)]
    comments_support: u32,
    /// Comments raising concerns
    #[arg(long, default_value_t = 0)]
    comments_concern: u32,
    /// Comments proposing changes
    #[arg(long, default_value_t = 0)]
    comments_proposal: u32,
}

impl From<CommentArgs> for CommentAnalysis {
    fn from(args: CommentArgs) -> Self {
        Self {
            total_comments: args.comments_total,
            support_comments: args.comments_support,
            concern_comments: args.comments_concern,
            proposal_comments: args.comments_proposal,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct DecisionFlags {
    /// Proposal id
    post_id: String,
    /// Decision action (e.g. approve_as_dept_agenda, escalate_to_facility, reject)
    action: String,
    /// Justification for the decision
    #[arg(long)]
    reason: Option<String>,
    /// Free-form comment
    #[arg(long)]
    comment: Option<String>,
    #[command(flatten)]
    comments: CommentArgs,
}

impl DecisionFlags {
    fn split(self) -> (String, DecisionArgs) {
        (
            self.post_id,
            DecisionArgs {
                action: self.action,
                reason: self.reason,
                comment: self.comment,
                comments: self.comments.into(),
            },
        )
    }
}

#[derive(Subcommand)]
enum ReviewAction {
    /// Gate 1: department review
    Department(DecisionFlags),
    /// Gate 2: facility review
    Facility(DecisionFlags),
    /// List proposals waiting at an open gate
    Queue {
        /// Only this gate (department or facility)
        #[arg(long)]
        gate: Option<String>,
    },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// Generate the document for an agenda-level proposal
    Generate {
        /// Proposal id
        proposal_id: String,
        #[command(flatten)]
        comments: CommentArgs,
    },
    /// Apply manager notes, context or recommendation
    Annotate {
        /// Document id
        id: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        context: Option<String>,
        /// strongly_recommend, recommend, neutral, or not_recommend
        #[arg(long)]
        recommendation: Option<String>,
    },
    /// Move a draft into review
    RequestReview {
        /// Document id
        id: String,
    },
    /// Return a document under review to draft
    ReturnToDraft {
        /// Document id
        id: String,
    },
    /// Mark a committee-eligible draft ready
    Ready {
        /// Document id
        id: String,
    },
    /// Show a document and its audit trail
    Show {
        /// Document id
        id: String,
    },
    /// List documents, newest first
    List {
        /// Only this status
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum SubmissionAction {
    /// Request submission of a ready document to a committee
    Request {
        /// Document id
        document_id: String,
        /// Target committee
        #[arg(long)]
        committee: String,
    },
    /// Approve a pending request
    Approve {
        /// Request id
        request_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject a pending request
    Reject {
        /// Request id
        request_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Show a request
    Show {
        /// Request id
        request_id: String,
    },
    /// List requests, newest first
    List {
        /// Only pending requests
        #[arg(long)]
        pending: bool,
        /// Only requests made by this user id
        #[arg(long)]
        user: Option<String>,
        /// Only requests to this committee
        #[arg(long)]
        committee: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the effective configuration to .agenda/config.toml
    Init,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    setup_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("agenda error: {}", e);
            ExitCode::from(exit_codes::INTERNAL as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.agenda/crash.log and exits with the internal error code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("agenda panic: {}", info);

        if let Some(home) = agenda_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::INTERNAL);
    }));
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();

    let code = match cli.command {
        Commands::Proposal { action } => run_proposal(action, config, &cli.global),
        Commands::Review { action } => run_review(action, config, &cli.global),
        Commands::Document { action } => run_document(action, config, &cli.global),
        Commands::Submission { action } => run_submission(action, config, &cli.global),
        Commands::Config { action } => {
            let cwd = std::env::current_dir()?;
            run_config(action, config, &cwd, &cli.global.options())
        }
    };
    Ok(code)
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert an optional command failure to an exit code.
fn to_exit_code(error: Option<&cli::CommandFailure>) -> ExitCode {
    ExitCode::from(cli::exit_code(error) as u8)
}

fn emit(formatted: String) {
    if !formatted.is_empty() {
        println!("{}", formatted.trim_end());
    }
}

/// Print an error that stopped a command before it ran.
fn report_failure(err: &AgendaError, options: &OutputOptions) -> ExitCode {
    let output = FailureOutput::new(err);
    emit(output.format_output(options));
    to_exit_code(Some(&output.error))
}

/// Open the workflow over the configured state file.
fn open_workflow(
    config: Config,
    options: &OutputOptions,
) -> Result<Workflow<FileRepository>, ExitCode> {
    match FileRepository::from_config(&config) {
        Ok(repo) => Ok(Workflow::new(repo, config)),
        Err(e) => Err(report_failure(&e, options)),
    }
}

/// Resolve the acting user, reporting the failure if the flags are missing.
fn require_actor(global: &GlobalArgs) -> Result<Actor, ExitCode> {
    global
        .actor()
        .map_err(|e| report_failure(&e, &global.options()))
}

fn run_proposal(action: ProposalAction, config: Config, global: &GlobalArgs) -> ExitCode {
    let options = global.options();
    let workflow = match open_workflow(config, &options) {
        Ok(workflow) => workflow,
        Err(code) => return code,
    };
    let cmd = ProposalCommand::new(workflow.review);

    let output = match action {
        ProposalAction::Register {
            id,
            content,
            author_id,
            author_name,
            department,
            facility,
        } => cmd.register(NewProposal {
            id,
            content,
            author_name: author_name.unwrap_or_else(|| author_id.clone()),
            author_id,
            department,
            facility,
        }),
        ProposalAction::Score {
            id,
            score,
            approve,
            neutral,
            oppose,
        } => cmd.score(&id, score, VoteCount::new(approve, neutral, oppose)),
        ProposalAction::Show { id } => cmd.show(&id),
        ProposalAction::List => cmd.list(),
    };

    emit(cmd.format_output(&output, &options));
    to_exit_code(output.error.as_ref())
}

fn run_review(action: ReviewAction, config: Config, global: &GlobalArgs) -> ExitCode {
    let options = global.options();
    let workflow = match open_workflow(config, &options) {
        Ok(workflow) => workflow,
        Err(code) => return code,
    };
    let cmd = ReviewCommand::new(workflow.review);

    let output = match review_output(&cmd, action, global) {
        Ok(output) => output,
        Err(code) => return code,
    };

    emit(cmd.format_output(&output, &options));
    to_exit_code(output.error.as_ref())
}

fn review_output(
    cmd: &ReviewCommand<FileRepository>,
    action: ReviewAction,
    global: &GlobalArgs,
) -> Result<ReviewOutput, ExitCode> {
    Ok(match action {
        ReviewAction::Queue { gate } => cmd.queue(gate.as_deref()),
        ReviewAction::Department(flags) => {
            let actor = require_actor(global)?;
            let (post_id, args) = flags.split();
            cmd.department(&post_id, args, &actor)
        }
        ReviewAction::Facility(flags) => {
            let actor = require_actor(global)?;
            let (post_id, args) = flags.split();
            cmd.facility(&post_id, args, &actor)
        }
    })
}

fn run_document(action: DocumentAction, config: Config, global: &GlobalArgs) -> ExitCode {
    let options = global.options();
    let workflow = match open_workflow(config, &options) {
        Ok(workflow) => workflow,
        Err(code) => return code,
    };
    let cmd = DocumentCommand::new(workflow.documents);

    let output = match document_output(&cmd, action, global) {
        Ok(output) => output,
        Err(code) => return code,
    };

    emit(cmd.format_output(&output, &options));
    to_exit_code(output.error.as_ref())
}

fn document_output(
    cmd: &DocumentCommand<FileRepository>,
    action: DocumentAction,
    global: &GlobalArgs,
) -> Result<DocumentOutput, ExitCode> {
    Ok(match action {
        DocumentAction::Show { id } => cmd.show(&id),
        DocumentAction::List { status } => cmd.list(status.as_deref()),
        DocumentAction::Generate {
            proposal_id,
            comments,
        } => cmd.generate(&proposal_id, comments.into(), &require_actor(global)?),
        DocumentAction::Annotate {
            id,
            notes,
            context,
            recommendation,
        } => {
            let actor = require_actor(global)?;
            let recommendation = recommendation
                .map(|r| r.parse::<RecommendationLevel>())
                .transpose()
                .map_err(|e| report_failure(&e, &global.options()))?;
            cmd.annotate(
                &id,
                ManagerAnnotation {
                    manager_notes: notes,
                    additional_context: context,
                    recommendation_level: recommendation,
                },
                &actor,
            )
        }
        DocumentAction::RequestReview { id } => cmd.request_review(&id, &require_actor(global)?),
        DocumentAction::ReturnToDraft { id } => cmd.return_to_draft(&id, &require_actor(global)?),
        DocumentAction::Ready { id } => cmd.ready(&id, &require_actor(global)?),
    })
}

fn run_submission(action: SubmissionAction, config: Config, global: &GlobalArgs) -> ExitCode {
    let options = global.options();
    let workflow = match open_workflow(config, &options) {
        Ok(workflow) => workflow,
        Err(code) => return code,
    };
    let cmd = SubmissionCommand::new(workflow.submissions);

    let output = match submission_output(&cmd, action, global) {
        Ok(output) => output,
        Err(code) => return code,
    };

    emit(cmd.format_output(&output, &options));
    to_exit_code(output.error.as_ref())
}

fn submission_output(
    cmd: &SubmissionCommand<FileRepository>,
    action: SubmissionAction,
    global: &GlobalArgs,
) -> Result<SubmissionOutput, ExitCode> {
    Ok(match action {
        SubmissionAction::Show { request_id } => cmd.show(&request_id),
        SubmissionAction::List {
            pending,
            user,
            committee,
        } => cmd.list(&RequestFilter {
            pending,
            user,
            committee,
        }),
        SubmissionAction::Request {
            document_id,
            committee,
        } => cmd.request(&document_id, &committee, &require_actor(global)?),
        SubmissionAction::Approve { request_id, notes } => {
            cmd.approve(&request_id, &require_actor(global)?, notes.as_deref())
        }
        SubmissionAction::Reject { request_id, reason } => {
            cmd.reject(&request_id, &require_actor(global)?, &reason)
        }
    })
}

fn run_config(
    action: ConfigAction,
    config: Config,
    cwd: &std::path::Path,
    options: &OutputOptions,
) -> ExitCode {
    let cmd = ConfigCommand::new(config);
    let output = match action {
        ConfigAction::Show => cmd.show(),
        ConfigAction::Init => cmd.init(cwd),
    };

    emit(cmd.format_output(&output, options));
    to_exit_code(output.error.as_ref())
}

// =============================================================================
// Tests
// =============================================================================
