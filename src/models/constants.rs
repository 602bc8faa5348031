//! Policy constants for the lesson and handoff lifecycle.
//!
//! These are deliberate knobs, not implementation details: the decay pass,
//! the archival sweep, and the completed-handoff visibility rules all read
//! from here. Thresholds that callers may want to vary per invocation are
//! also carried by [`HandoffPolicy`].

/// Uses saturate here; citations beyond this are counted but capped.
pub const MAX_USES: u32 = 100;

/// Project lessons become promotion candidates at this use count.
pub const SYSTEM_PROMOTION_THRESHOLD: u32 = 50;

/// Velocity half-life factor applied by each decay pass.
pub const VELOCITY_DECAY_FACTOR: f64 = 0.5;

/// Velocities below this collapse to zero during decay.
pub const VELOCITY_EPSILON: f64 = 0.01;

/// A lesson uncited for this many days counts as stale in listings.
pub const LESSON_STALE_DAYS: i64 = 60;

/// Default stale threshold (days) for the decay pass's uses decrement.
pub const DECAY_STALE_THRESHOLD_DAYS: i64 = 30;

/// Duplicate detection only applies substring containment when the
/// normalized title is longer than this. Shorter titles match on exact
/// equality only ("auth" must not swallow "authorization").
pub const DUPLICATE_SUBSTRING_MIN_LEN: usize = 10;

/// Query text sent to the relevance scorer is truncated to this length.
pub const SCORE_RELEVANCE_MAX_QUERY_LEN: usize = 500;

/// Default timeout for the relevance scorer subprocess.
pub const SCORE_RELEVANCE_TIMEOUT_SECS: u64 = 30;

/// Active handoffs untouched for this many days are auto-archived.
pub const HANDOFF_STALE_DAYS: i64 = 14;

/// Completed handoffs older than this are auto-archived.
pub const HANDOFF_COMPLETED_ARCHIVE_DAYS: i64 = 30;

/// Completed-handoff visibility: always show the most recent N.
pub const HANDOFF_MAX_COMPLETED: usize = 5;

/// Completed-handoff visibility: always show completions younger than this.
pub const HANDOFF_MAX_AGE_DAYS: i64 = 7;

/// Tried-step descriptions starting with one of these (case-insensitive,
/// success outcome) auto-complete the handoff.
pub const COMPLETION_PATTERNS: &[&str] = &["final", "done", "complete", "finished"];

/// Tried-step descriptions containing one of these bump the phase to
/// implementing, unless the handoff is already implementing or in review.
pub const IMPLEMENTING_KEYWORDS: &[&str] = &[
    "implement", "build", "create", "add", "fix", "write", "update", "refactor", "remove",
    "delete", "rename", "move", "extract",
];

/// Successful tried steps at or above this count also bump the phase.
pub const IMPLEMENTING_STEP_THRESHOLD: usize = 10;

/// Archival and visibility thresholds, overridable per call site.
#[derive(Debug, Clone, Copy)]
pub struct HandoffPolicy {
    /// Days of inactivity before an active handoff is archived as stale.
    pub stale_days: i64,
    /// Days after which a completed handoff is archived.
    pub completed_archive_days: i64,
    /// Completed handoffs always visible by recency rank.
    pub max_completed: usize,
    /// Completed handoffs always visible by age.
    pub max_age_days: i64,
}

impl Default for HandoffPolicy {
    fn default() -> Self {
        Self {
            stale_days: HANDOFF_STALE_DAYS,
            completed_archive_days: HANDOFF_COMPLETED_ARCHIVE_DAYS,
            max_completed: HANDOFF_MAX_COMPLETED,
            max_age_days: HANDOFF_MAX_AGE_DAYS,
        }
    }
}
