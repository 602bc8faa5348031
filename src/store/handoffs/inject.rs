//! Handoff context injection and todo-list reconciliation.
//!
//! `inject` renders the session-start handoff block; `sync_todos` and
//! `inject_todos` bridge an ephemeral external todo list with the
//! persistent store in both directions.

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;

use crate::models::constants::{HandoffPolicy, COMPLETION_PATTERNS};
use crate::models::{
    Handoff, HandoffStatus, TodoItem, TodoStatus, TriedOutcome, TriedStep,
};

use super::super::{HandoffOps, Recall};

/// Keyword themes used to bin older tried steps for the compact summary.
const STEP_THEMES: &[(&str, &[&str])] = &[
    ("guard", &["guard", "is_destroyed", "destructor", "cleanup"]),
    ("plugin", &["plugin", "phase"]),
    ("ui", &["xml", "button", "modal", "panel", "ui_"]),
    ("fix", &["fix", "bug", "issue", "error"]),
    ("refactor", &["refactor", "move", "rename", "extract"]),
    ("test", &["test", "verify", "build"]),
];

/// Steps shown verbatim at the tail of a tried summary.
const SUMMARY_RECENT_STEPS: usize = 3;

impl Recall {
    pub(super) fn inject_impl(&self, policy: &HandoffPolicy) -> Result<String> {
        // Sweep before rendering so the reader never sees stale entries.
        self.archive_stale_handoffs(policy)?;
        self.archive_old_completed_handoffs(policy)?;

        let active = self.handoff_list(None, false)?;
        let completed = self.handoff_list_completed(policy)?;

        if active.is_empty() && completed.is_empty() {
            return Ok(String::new());
        }

        let all_handoffs = self.handoff_list(None, true)?;
        let ready_count = active
            .iter()
            .filter(|h| is_handoff_ready(h, &all_handoffs))
            .count();

        let mut lines = Vec::new();

        if !active.is_empty() {
            if ready_count > 0 {
                lines.push(format!("## Active Handoffs (Ready: {ready_count})"));
            } else {
                lines.push("## Active Handoffs (All blocked)".to_string());
            }
            lines.push(String::new());

            for handoff in &active {
                lines.push(format!("### [{}] {}", handoff.id, handoff.title));

                let appears_done = appears_done(handoff);
                let status_str = if appears_done {
                    format!("{} → completing", handoff.status)
                } else {
                    handoff.status.to_string()
                };
                lines.push(format!(
                    "- **Status**: {} | **Phase**: {} | **Last**: {}",
                    status_str,
                    handoff.phase,
                    relative_age(handoff.updated)
                ));

                if !handoff.refs.is_empty() {
                    let refs_str = if handoff.refs.len() <= 3 {
                        handoff.refs.join(" | ")
                    } else {
                        format!(
                            "{} (+{} more)",
                            handoff.refs[..3].join(" | "),
                            handoff.refs.len() - 3
                        )
                    };
                    lines.push(format!("- **Refs**: {refs_str}"));
                }

                lines.extend(summarize_tried_steps(&handoff.tried));

                if !handoff.checkpoint.is_empty() {
                    lines.push(format!("- **Checkpoint**: {}", handoff.checkpoint));
                }

                if let Some(ctx) = &handoff.handoff {
                    let abbreviated: String = ctx.git_ref.chars().take(7).collect();
                    lines.push(format!("- **Handoff** (from {abbreviated}):"));
                    lines.push(format!("  - Summary: {}", ctx.summary));
                    if !ctx.critical_files.is_empty() {
                        let mut refs_str = ctx.critical_files[..ctx.critical_files.len().min(3)]
                            .join(", ");
                        if ctx.critical_files.len() > 3 {
                            refs_str.push_str(&format!(
                                " (+{} more)",
                                ctx.critical_files.len() - 3
                            ));
                        }
                        lines.push(format!("  - Refs: {refs_str}"));
                    }
                    if !ctx.learnings.is_empty() {
                        lines.push(format!("  - Learnings: {}", ctx.learnings.join(", ")));
                    }
                    if !ctx.blockers.is_empty() {
                        lines.push(format!("  - Blockers: {}", ctx.blockers.join(", ")));
                    }
                }

                if !handoff.blocked_by.is_empty() {
                    lines.push(format!("- **Blocked By**: {}", handoff.blocked_by.join(", ")));
                }

                if appears_done {
                    let last = &handoff.tried[handoff.tried.len() - 1].description;
                    let preview: String = last.chars().take(30).collect();
                    lines.push(format!(
                        "- ⚠️ **Appears done** - last step was \"{preview}...\""
                    ));
                }

                if !handoff.next_steps.is_empty() {
                    lines.push(format!("- **Next**: {}", handoff.next_steps));
                }

                lines.push(String::new());
            }
        }

        if !completed.is_empty() {
            lines.push("## Recent Completions".to_string());
            lines.push(String::new());
            for handoff in &completed {
                lines.push(format!(
                    "  [{}] ✓ {} (completed {})",
                    handoff.id,
                    handoff.title,
                    relative_age(handoff.updated)
                ));
            }
            lines.push(String::new());
        }

        Ok(lines.join("\n"))
    }

    pub(super) fn sync_todos_impl(&self, todos: &[TodoItem]) -> Result<Option<String>> {
        if todos.is_empty() {
            return Ok(None);
        }

        let completed: Vec<&TodoItem> = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .collect();
        let in_progress: Vec<&TodoItem> = todos
            .iter()
            .filter(|t| t.status == TodoStatus::InProgress)
            .collect();
        let pending: Vec<&TodoItem> = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Pending)
            .collect();

        // Target the most recently touched active handoff, or start one
        // named after the first todo.
        let active = self.handoff_list(None, false)?;
        let handoff_id = match active.iter().max_by_key(|h| h.updated) {
            Some(handoff) => handoff.id.clone(),
            None => {
                let first = todos[0].content.as_str();
                let title = if first.chars().count() > 50 {
                    format!("{}...", first.chars().take(50).collect::<String>())
                } else {
                    first.to_string()
                };
                self.handoff_add(
                    &title,
                    None,
                    vec![],
                    crate::models::Phase::Research,
                    crate::models::Agent::User,
                )?
            }
        };

        // Completed todos become success steps, skipping exact duplicates.
        let existing_tried: std::collections::HashSet<String> = self
            .handoff_get(&handoff_id)?
            .map(|h| h.tried.into_iter().map(|t| t.description).collect())
            .unwrap_or_default();
        for todo in &completed {
            if !todo.content.is_empty() && !existing_tried.contains(&todo.content) {
                self.handoff_add_tried(&handoff_id, TriedOutcome::Success, &todo.content)?;
            }
        }

        if let Some(first) = in_progress.first() {
            let mut checkpoint = first.content.clone();
            if in_progress.len() > 1 {
                checkpoint.push_str(&format!(" (and {} more)", in_progress.len() - 1));
            }
            self.handoff_update_checkpoint(&handoff_id, &checkpoint)?;
        }

        if !pending.is_empty() {
            let mut next_text = pending
                .iter()
                .take(5)
                .map(|t| t.content.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            if pending.len() > 5 {
                next_text.push_str(&format!(" (and {} more)", pending.len() - 5));
            }
            self.handoff_update_next(&handoff_id, &next_text)?;
        }

        if !in_progress.is_empty() {
            self.handoff_update_status(&handoff_id, HandoffStatus::InProgress)?;
        } else if !pending.is_empty() && completed.is_empty() {
            self.handoff_update_status(&handoff_id, HandoffStatus::NotStarted)?;
        }

        self.logger().mutation(
            "sync_todos",
            &handoff_id,
            json!({
                "completed": completed.len(),
                "in_progress": in_progress.len(),
                "pending": pending.len(),
            }),
        );

        Ok(Some(handoff_id))
    }

    pub(super) fn inject_todos_impl(&self) -> Result<String> {
        let active = self.handoff_list(None, false)?;
        let Some(handoff) = active.into_iter().max_by_key(|h| h.updated) else {
            return Ok(String::new());
        };

        let prefix = format!("[{}] ", handoff.id);
        let mut todos = Vec::new();

        for step in &handoff.tried {
            if step.outcome == TriedOutcome::Success {
                todos.push(TodoItem {
                    content: format!("{prefix}{}", step.description),
                    status: TodoStatus::Completed,
                    active_form: Some(truncate_active_form(&step.description)),
                });
            }
        }

        if !handoff.checkpoint.is_empty() {
            todos.push(TodoItem {
                content: format!("{prefix}{}", handoff.checkpoint),
                status: TodoStatus::InProgress,
                active_form: Some(truncate_active_form(&handoff.checkpoint)),
            });
        }

        for step in handoff.next_steps.split(';') {
            let step = step.trim();
            if !step.is_empty() {
                todos.push(TodoItem {
                    content: format!("{prefix}{step}"),
                    status: TodoStatus::Pending,
                    active_form: Some(truncate_active_form(step)),
                });
            }
        }

        if todos.is_empty() {
            return Ok(String::new());
        }

        let session_ago = handoff.last_session.map(|session| {
            let days = (Recall::today() - session).num_days();
            match days {
                0 => "today".to_string(),
                1 => "yesterday".to_string(),
                n => format!("{n}d ago"),
            }
        });

        let mut lines = Vec::new();
        lines.push(format!(
            "**CONTINUE PREVIOUS WORK** ({}: {})",
            handoff.id, handoff.title
        ));
        if let Some(ago) = session_ago {
            lines.push(format!("Last session: {ago}"));
        }
        lines.push(String::new());
        lines.push("Previous state:".to_string());
        for todo in &todos {
            let icon = match todo.status {
                TodoStatus::Completed => "✓",
                TodoStatus::InProgress => "→",
                TodoStatus::Pending => "○",
            };
            lines.push(format!("  {icon} {}", todo.content));
        }
        lines.push(String::new());
        lines.push("**Use TodoWrite to resume tracking.** Copy this starting point:".to_string());
        lines.push("```json".to_string());
        let open: Vec<&TodoItem> = todos
            .iter()
            .filter(|t| t.status != TodoStatus::Completed)
            .collect();
        lines.push(serde_json::to_string_pretty(&open)?);
        lines.push("```".to_string());

        Ok(lines.join("\n"))
    }
}

/// Ready means no blockers, or every blocker is completed or absent from
/// the active set (deleted or archived blockers no longer block).
pub(super) fn is_handoff_ready(handoff: &Handoff, all_handoffs: &[Handoff]) -> bool {
    if handoff.blocked_by.is_empty() {
        return true;
    }

    let by_id: HashMap<&str, &Handoff> =
        all_handoffs.iter().map(|h| (h.id.as_str(), h)).collect();

    handoff.blocked_by.iter().all(|blocker_id| {
        by_id
            .get(blocker_id.as_str())
            .map(|blocker| blocker.status == HandoffStatus::Completed)
            .unwrap_or(true)
    })
}

/// The last tried step reads like a completion but the status disagrees.
fn appears_done(handoff: &Handoff) -> bool {
    if handoff.status == HandoffStatus::Completed {
        return false;
    }
    let Some(last) = handoff.tried.last() else {
        return false;
    };
    let desc = last.description.to_lowercase();
    let desc = desc.trim();
    COMPLETION_PATTERNS.iter().any(|p| desc.starts_with(p))
}

/// Compact tried summary: progress counts, the last few steps verbatim,
/// and a theme histogram for everything earlier.
fn summarize_tried_steps(tried: &[TriedStep]) -> Vec<String> {
    if tried.is_empty() {
        return Vec::new();
    }

    let total = tried.len();
    let success = tried
        .iter()
        .filter(|t| t.outcome == TriedOutcome::Success)
        .count();
    let fail = tried
        .iter()
        .filter(|t| t.outcome == TriedOutcome::Fail)
        .count();

    let outcome_str = if fail == 0 {
        format!("{total} steps (all success)")
    } else {
        format!("{total} steps ({success}✓ {fail}✗)")
    };

    let mut lines = vec![format!("- **Progress**: {outcome_str}")];

    let recent_start = total.saturating_sub(SUMMARY_RECENT_STEPS);
    for step in &tried[recent_start..] {
        let desc = if step.description.chars().count() > 50 {
            format!(
                "{}...",
                step.description.chars().take(50).collect::<String>()
            )
        } else {
            step.description.clone()
        };
        lines.push(format!("  → {desc}"));
    }

    if total > SUMMARY_RECENT_STEPS {
        let themes = extract_themes(&tried[..recent_start]);
        if !themes.is_empty() {
            let theme_strs: Vec<String> = themes
                .iter()
                .take(4)
                .map(|(name, count)| format!("{count} {name}"))
                .collect();
            lines.push(format!("  Earlier: {}", theme_strs.join(", ")));
        }
    }

    lines
}

/// Bin steps by keyword theme, most frequent first (name breaks ties).
fn extract_themes(tried: &[TriedStep]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for step in tried {
        let desc = step.description.to_lowercase();
        let theme = STEP_THEMES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| desc.contains(kw)))
            .map(|(name, _)| *name)
            .unwrap_or("other");
        *counts.entry(theme).or_insert(0) += 1;
    }

    let mut themes: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    themes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    themes
}

/// Day-granular relative age for display.
fn relative_age(date: NaiveDate) -> String {
    let days = (Recall::today() - date).num_days();
    match days {
        0 => "today".to_string(),
        1 => "1d ago".to_string(),
        n => format!("{n}d ago"),
    }
}

fn truncate_active_form(s: &str) -> String {
    if s.chars().count() > 50 {
        format!("{}...", s.chars().take(50).collect::<String>())
    } else {
        s.to_string()
    }
}
