//! The persistent store facade.
//!
//! [`Recall`] owns the filesystem roots and the event logger, and satisfies
//! the two capability surfaces of the system: [`LessonOps`] for durable
//! lessons and [`HandoffOps`] for in-flight work. Every mutating operation
//! is one short transaction: take the file lock, read the whole file, apply
//! the change in memory, write the file back, release the lock.

pub mod handoffs;
pub mod lessons;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::fs::paths;
use crate::logging::EventLogger;
use crate::models::constants::HandoffPolicy;
use crate::models::{
    Agent, CitationResult, CompleteResult, DecayResult, Handoff, HandoffContext, HandoffStatus,
    InjectionResult, Lesson, LessonCategory, LessonLevel, LessonSource, Phase, ResumeResult,
    TodoItem, TriedOutcome,
};

/// Facade over the lesson and handoff stores for one (user, project) pair.
pub struct Recall {
    lessons_base: PathBuf,
    project_root: PathBuf,
    logger: EventLogger,
}

impl Recall {
    /// Store rooted at explicit directories, logger resolved from the
    /// environment.
    pub fn new(lessons_base: PathBuf, project_root: PathBuf) -> Self {
        Self::with_logger(lessons_base, project_root, EventLogger::from_env())
    }

    /// Store with a caller-supplied logger (tests use a disabled one).
    pub fn with_logger(lessons_base: PathBuf, project_root: PathBuf, logger: EventLogger) -> Self {
        Self {
            lessons_base,
            project_root,
            logger,
        }
    }

    /// Store resolved entirely from the environment.
    pub fn from_env() -> Self {
        Self::new(paths::lessons_base(), paths::project_root())
    }

    pub fn lessons_base(&self) -> &Path {
        &self.lessons_base
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn system_lessons_file(&self) -> PathBuf {
        self.lessons_base.join(paths::LESSONS_FILE)
    }

    pub fn project_lessons_file(&self) -> PathBuf {
        paths::project_lessons_file(&self.project_root)
    }

    /// Lessons file owning the given scope.
    pub fn lessons_file(&self, level: LessonLevel) -> PathBuf {
        match level {
            LessonLevel::System => self.system_lessons_file(),
            LessonLevel::Project => self.project_lessons_file(),
        }
    }

    pub fn handoffs_file(&self) -> PathBuf {
        paths::project_handoffs_file(&self.project_root)
    }

    pub fn handoffs_archive(&self) -> PathBuf {
        paths::project_handoffs_archive(&self.project_root)
    }

    pub fn decay_state_file(&self) -> PathBuf {
        paths::decay_state_file(&self.lessons_base)
    }

    pub fn session_state_dir(&self) -> PathBuf {
        paths::session_state_dir(&self.lessons_base)
    }

    pub(crate) fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Acquire the exclusive lock for a store file, tracing the wait.
    pub(crate) fn lock_file(&self, path: &Path) -> Result<crate::fs::locking::FileLock> {
        let start = std::time::Instant::now();
        let lock = crate::fs::locking::FileLock::acquire(path)?;
        self.logger
            .lock_acquired(path, start.elapsed().as_secs_f64() * 1000.0);
        Ok(lock)
    }
}

/// Lesson operations: durable knowledge with a citation-driven lifecycle.
pub trait LessonOps {
    /// Add a lesson; returns the allocated id. Fails with `Duplicate` when a
    /// near-duplicate title exists and `force` is false.
    #[allow(clippy::too_many_arguments)]
    fn add_lesson(
        &self,
        level: LessonLevel,
        category: LessonCategory,
        title: &str,
        content: &str,
        source: LessonSource,
        force: bool,
        promotable: bool,
    ) -> Result<String>;

    /// Convenience wrapper for AI-generated lessons.
    fn add_ai_lesson(
        &self,
        level: LessonLevel,
        category: LessonCategory,
        title: &str,
        content: &str,
        promotable: bool,
    ) -> Result<String>;

    fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>>;

    /// Increment uses (saturating) and velocity, stamp last_used.
    fn cite_lesson(&self, lesson_id: &str) -> Result<CitationResult>;

    fn edit_lesson(&self, lesson_id: &str, new_content: &str) -> Result<()>;

    fn delete_lesson(&self, lesson_id: &str) -> Result<()>;

    /// Copy a project lesson to system scope under a fresh id, then remove
    /// the project copy. Two sequential lock phases; see the impl notes.
    fn promote_lesson(&self, lesson_id: &str) -> Result<String>;

    fn list_lessons(
        &self,
        scope: Option<LessonLevel>,
        search: Option<&str>,
        category: Option<LessonCategory>,
        stale_only: bool,
    ) -> Result<Vec<Lesson>>;

    /// Select the top lessons by uses for session-start injection.
    fn inject_context(&self, top_n: usize) -> Result<InjectionResult>;

    /// Render the session-start lesson block.
    fn inject_lessons(&self, limit: usize) -> Result<String>;

    /// Global maintenance: halve velocities, decrement stale uses, skip
    /// entirely in vacation mode.
    fn decay_lessons(&self, stale_threshold_days: i64) -> Result<DecayResult>;
}

/// Handoff operations: multi-step work tracked across sessions.
pub trait HandoffOps {
    fn handoff_add(
        &self,
        title: &str,
        desc: Option<&str>,
        refs: Vec<String>,
        phase: Phase,
        agent: Agent,
    ) -> Result<String>;

    fn handoff_get(&self, handoff_id: &str) -> Result<Option<Handoff>>;

    fn handoff_update_status(&self, handoff_id: &str, status: HandoffStatus) -> Result<()>;
    fn handoff_update_phase(&self, handoff_id: &str, phase: Phase) -> Result<()>;
    fn handoff_update_agent(&self, handoff_id: &str, agent: Agent) -> Result<()>;
    fn handoff_update_next(&self, handoff_id: &str, text: &str) -> Result<()>;
    fn handoff_update_refs(&self, handoff_id: &str, refs: Vec<String>) -> Result<()>;
    fn handoff_update_desc(&self, handoff_id: &str, description: &str) -> Result<()>;

    /// Set the legacy checkpoint summary; stamps last_session.
    fn handoff_update_checkpoint(&self, handoff_id: &str, checkpoint: &str) -> Result<()>;

    /// Set the structured context; stamps last_session.
    fn handoff_update_context(&self, handoff_id: &str, context: HandoffContext) -> Result<()>;

    fn handoff_update_blocked_by(&self, handoff_id: &str, blocked_by: Vec<String>) -> Result<()>;

    /// Append a tried step, then apply auto-complete and auto-phase rules.
    fn handoff_add_tried(
        &self,
        handoff_id: &str,
        outcome: TriedOutcome,
        description: &str,
    ) -> Result<()>;

    /// Mark completed and return a lesson-extraction prompt.
    fn handoff_complete(&self, handoff_id: &str) -> Result<CompleteResult>;

    /// Move a handoff from the active file to the archive.
    fn handoff_archive(&self, handoff_id: &str) -> Result<()>;

    /// Permanent removal, no archive.
    fn handoff_delete(&self, handoff_id: &str) -> Result<()>;

    fn handoff_list(
        &self,
        status_filter: Option<HandoffStatus>,
        include_completed: bool,
    ) -> Result<Vec<Handoff>>;

    /// Completed handoffs visible under the hybrid top-N-or-recent rule.
    fn handoff_list_completed(&self, policy: &HandoffPolicy) -> Result<Vec<Handoff>>;

    /// Render the session-start handoff block. Runs the auto-archive sweep
    /// first.
    fn handoff_inject(&self, policy: &HandoffPolicy) -> Result<String>;

    /// Reconcile an external todo list into the most recent active handoff,
    /// creating one when none exists. Returns the target id.
    fn handoff_sync_todos(&self, todos: &[TodoItem]) -> Result<Option<String>>;

    /// Render the most recent active handoff as a todo continuation prompt.
    fn handoff_inject_todos(&self) -> Result<String>;

    /// Non-completed handoffs whose blockers are all completed or missing,
    /// in_progress first then most recently updated.
    fn handoff_ready(&self) -> Result<Vec<Handoff>>;

    /// Load a handoff and validate codebase drift against its context.
    fn handoff_resume(&self, handoff_id: &str) -> Result<ResumeResult>;
}
