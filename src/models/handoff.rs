//! Handoff records: in-flight work tracked across agent sessions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    NotStarted,
    InProgress,
    Blocked,
    Completed,
}

impl HandoffStatus {
    pub fn all() -> &'static [HandoffStatus] {
        &[
            HandoffStatus::NotStarted,
            HandoffStatus::InProgress,
            HandoffStatus::Blocked,
            HandoffStatus::Completed,
        ]
    }
}

impl std::fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandoffStatus::NotStarted => "not_started",
            HandoffStatus::InProgress => "in_progress",
            HandoffStatus::Blocked => "blocked",
            HandoffStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HandoffStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(HandoffStatus::NotStarted),
            "in_progress" => Ok(HandoffStatus::InProgress),
            "blocked" => Ok(HandoffStatus::Blocked),
            "completed" => Ok(HandoffStatus::Completed),
            _ => anyhow::bail!(
                "Invalid status: {s}. Use: not_started, in_progress, blocked, completed"
            ),
        }
    }
}

/// Work phase. Auto-inference never regresses out of Implementing/Review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Research,
    Planning,
    Implementing,
    Review,
}

impl Phase {
    /// Phases the auto-bump rule must not overwrite
    pub fn is_protected(&self) -> bool {
        matches!(self, Phase::Implementing | Phase::Review)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Research => "research",
            Phase::Planning => "planning",
            Phase::Implementing => "implementing",
            Phase::Review => "review",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "research" => Ok(Phase::Research),
            "planning" => Ok(Phase::Planning),
            "implementing" => Ok(Phase::Implementing),
            "review" => Ok(Phase::Review),
            _ => anyhow::bail!("Invalid phase: {s}. Use: research, planning, implementing, review"),
        }
    }
}

/// Agent kind assigned to a handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Agent {
    Explore,
    GeneralPurpose,
    Plan,
    Review,
    User,
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Agent::Explore => "explore",
            Agent::GeneralPurpose => "general-purpose",
            Agent::Plan => "plan",
            Agent::Review => "review",
            Agent::User => "user",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Agent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "explore" => Ok(Agent::Explore),
            "general-purpose" => Ok(Agent::GeneralPurpose),
            "plan" => Ok(Agent::Plan),
            "review" => Ok(Agent::Review),
            "user" => Ok(Agent::User),
            _ => anyhow::bail!(
                "Invalid agent: {s}. Use: explore, general-purpose, plan, review, user"
            ),
        }
    }
}

/// Outcome tag on a tried step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriedOutcome {
    Success,
    Fail,
    Partial,
}

impl std::fmt::Display for TriedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriedOutcome::Success => "success",
            TriedOutcome::Fail => "fail",
            TriedOutcome::Partial => "partial",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TriedOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(TriedOutcome::Success),
            "fail" => Ok(TriedOutcome::Fail),
            "partial" => Ok(TriedOutcome::Partial),
            _ => anyhow::bail!("Invalid outcome: {s}. Use: success, fail, partial"),
        }
    }
}

/// One attempted action within a handoff, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriedStep {
    pub outcome: TriedOutcome,
    pub description: String,
}

/// Structured snapshot captured for resumption (the richer successor to the
/// single-string checkpoint)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandoffContext {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub critical_files: Vec<String>,
    #[serde(default)]
    pub recent_changes: Vec<String>,
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub git_ref: String,
}

impl HandoffContext {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.critical_files.is_empty()
            && self.recent_changes.is_empty()
            && self.learnings.is_empty()
            && self.blockers.is_empty()
    }
}

/// A unit of in-flight work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    /// `hf-<7-hex>` for new records, `A###` accepted from legacy files
    pub id: String,
    pub title: String,
    pub status: HandoffStatus,
    pub phase: Phase,
    pub agent: Agent,
    pub created: NaiveDate,
    pub updated: NaiveDate,
    /// `path:line` or `path:start-end` references
    pub refs: Vec<String>,
    pub description: String,
    pub tried: Vec<TriedStep>,
    pub next_steps: String,
    /// Legacy single-string progress summary
    pub checkpoint: String,
    pub last_session: Option<NaiveDate>,
    /// Structured context, when one has been captured
    pub handoff: Option<HandoffContext>,
    /// Ids of handoffs that must complete first
    pub blocked_by: Vec<String>,
}

impl Handoff {
    pub fn success_count(&self) -> usize {
        self.tried
            .iter()
            .filter(|t| t.outcome == TriedOutcome::Success)
            .count()
    }
}

/// Result of completing a handoff: the record plus a prompt for mining
/// lessons out of it
#[derive(Debug, Clone)]
pub struct CompleteResult {
    pub handoff: Handoff,
    pub extraction_prompt: String,
}

/// Codebase-drift validation performed at resume time
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// False only when errors are present; warnings do not invalidate
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Result of resuming a handoff
#[derive(Debug, Clone)]
pub struct ResumeResult {
    pub handoff: Handoff,
    pub validation: ValidationReport,
    pub context: Option<HandoffContext>,
}

/// Status of an externally tracked todo (the sync-todos wire format)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Completed,
    InProgress,
    Pending,
}

/// One element of the sync-todos JSON array
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm", skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in HandoffStatus::all() {
            let parsed: HandoffStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, *status);
        }
    }

    #[test]
    fn test_agent_kebab_case() {
        assert_eq!(
            "general-purpose".parse::<Agent>().unwrap(),
            Agent::GeneralPurpose
        );
        assert_eq!(Agent::GeneralPurpose.to_string(), "general-purpose");
    }

    #[test]
    fn test_protected_phases() {
        assert!(Phase::Implementing.is_protected());
        assert!(Phase::Review.is_protected());
        assert!(!Phase::Research.is_protected());
        assert!(!Phase::Planning.is_protected());
    }

    #[test]
    fn test_todo_item_wire_format() {
        let json = r#"[{"content":"Refactor parser","status":"in_progress","activeForm":"Refactoring parser"}]"#;
        let todos: Vec<TodoItem> = serde_json::from_str(json).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].status, TodoStatus::InProgress);
        assert_eq!(todos[0].active_form.as_deref(), Some("Refactoring parser"));
    }
}
