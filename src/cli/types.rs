use clap::{Parser, Subcommand};
use recall::models::constants::{DECAY_STALE_THRESHOLD_DAYS, SCORE_RELEVANCE_TIMEOUT_SECS};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Tool-agnostic memory substrate for AI coding agents", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a project lesson
    Add {
        /// Lesson category (pattern, correction, decision, gotcha, preference)
        category: String,

        /// Lesson title
        title: String,

        /// Lesson content
        content: String,

        /// Skip duplicate detection
        #[arg(long)]
        force: bool,

        /// Add at system scope instead of project scope
        #[arg(long)]
        system: bool,

        /// Never promote this lesson to system scope
        #[arg(long = "no-promote")]
        no_promote: bool,
    },

    /// Add an AI-generated lesson
    AddAi {
        category: String,
        title: String,
        content: String,

        /// Add at system scope instead of project scope
        #[arg(long)]
        system: bool,

        /// Never promote this lesson to system scope
        #[arg(long = "no-promote")]
        no_promote: bool,
    },

    /// Add a system lesson (alias for add --system)
    AddSystem {
        category: String,
        title: String,
        content: String,

        /// Skip duplicate detection
        #[arg(long)]
        force: bool,
    },

    /// Cite a lesson, incrementing its metrics
    Cite {
        /// Lesson ID (e.g. L001 or S001)
        lesson_id: String,
    },

    /// Output top lessons for session-start injection
    Inject {
        /// Number of top lessons to show in detail
        #[arg(default_value_t = 5)]
        top_n: usize,
    },

    /// List lessons
    List {
        /// Project lessons only
        #[arg(long)]
        project: bool,

        /// System lessons only
        #[arg(long)]
        system: bool,

        /// Search term for id/title/content
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Show stale lessons only (60+ days uncited)
        #[arg(long)]
        stale: bool,
    },

    /// Decay lesson metrics (velocity half-life, stale uses decrement)
    Decay {
        /// Days of inactivity before uses decay
        #[arg(default_value_t = DECAY_STALE_THRESHOLD_DAYS)]
        days: i64,
    },

    /// Edit a lesson's content
    Edit {
        lesson_id: String,
        content: String,
    },

    /// Delete a lesson
    #[command(visible_alias = "remove")]
    Delete { lesson_id: String },

    /// Promote a project lesson to system scope
    Promote { lesson_id: String },

    /// Score lessons by relevance to text via an external model
    ScoreRelevance {
        /// Text to score lessons against
        text: String,

        /// Number of top results to show
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Minimum relevance score (0-10)
        #[arg(long = "min-score", default_value_t = 0)]
        min_score: u8,

        /// Timeout in seconds for the scorer call
        #[arg(long, default_value_t = SCORE_RELEVANCE_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Manage handoffs (multi-step work tracking)
    #[command(visible_alias = "approach")]
    Handoff {
        #[command(subcommand)]
        command: HandoffCommands,
    },

    /// Show system health and recent activity from the event log
    Status {
        /// Filter recent events to one project
        #[arg(long)]
        project: Option<String>,

        /// Number of recent events to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum HandoffCommands {
    /// Add a new handoff
    #[command(visible_alias = "start")]
    Add {
        /// Handoff title
        title: String,

        /// Description
        #[arg(long)]
        desc: Option<String>,

        /// Comma-separated path:line refs
        #[arg(long)]
        refs: Option<String>,

        /// Initial phase (research, planning, implementing, review)
        #[arg(long, default_value = "research")]
        phase: String,

        /// Agent working on this (explore, general-purpose, plan, review, user)
        #[arg(long, default_value = "user")]
        agent: String,
    },

    /// Update one or more handoff fields
    Update {
        /// Handoff ID (e.g. A001 or hf-abc1234)
        id: String,

        /// New status (not_started, in_progress, blocked, completed)
        #[arg(long)]
        status: Option<String>,

        /// Add a tried step: OUTCOME DESCRIPTION (outcome: success|fail|partial)
        #[arg(long, num_args = 2, value_names = ["OUTCOME", "DESC"])]
        tried: Option<Vec<String>>,

        /// Update next steps
        #[arg(long)]
        next: Option<String>,

        /// Update refs (comma-separated path:line)
        #[arg(long)]
        refs: Option<String>,

        /// Update description
        #[arg(long)]
        desc: Option<String>,

        /// Update phase
        #[arg(long)]
        phase: Option<String>,

        /// Update agent
        #[arg(long)]
        agent: Option<String>,

        /// Update checkpoint (progress summary for session handoff)
        #[arg(long)]
        checkpoint: Option<String>,

        /// Update dependency list (comma-separated handoff ids)
        #[arg(long = "blocked-by")]
        blocked_by: Option<String>,
    },

    /// Mark a handoff as completed and print an extraction prompt
    Complete { id: String },

    /// Move a handoff to the archive file
    Archive { id: String },

    /// Delete a handoff permanently (no archive)
    #[command(visible_alias = "remove")]
    Delete { id: String },

    /// List handoffs
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Include completed handoffs
        #[arg(long = "include-completed")]
        include_completed: bool,
    },

    /// Show one handoff in full
    Show { id: String },

    /// Output handoffs for context injection
    Inject,

    /// Sync an external todo list into a handoff (JSON array argument)
    SyncTodos {
        /// JSON array of {content, status, activeForm} objects
        todos_json: String,
    },

    /// Format the active handoff as a todo continuation prompt
    InjectTodos,

    /// List handoffs whose dependencies are satisfied
    Ready,

    /// Set structured handoff context from JSON
    SetContext {
        id: String,

        /// JSON object: summary, critical_files, recent_changes, learnings, blockers, git_ref
        #[arg(long = "json")]
        context_json: String,
    },

    /// Resume a handoff, validating codebase state
    Resume { id: String },
}
