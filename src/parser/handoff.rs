//! Handoff block parsing and formatting.
//!
//! Current grammar splits status and dates across two lines and uses
//! pipe-separated `Refs`; the legacy grammar folded Created/Updated into
//! the status line and used comma-separated `Files`. Both are accepted on
//! read, the current form is written back.

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{Handoff, HandoffContext, HandoffStatus, Phase, TriedStep};

/// Validate a `path:line` or `path:start-end` reference.
pub fn validate_ref(r: &str) -> bool {
    let re = Regex::new(r"^[^\s:]+:\d+(-\d+)?$").expect("valid regex");
    re.is_match(r)
}

struct BlockPatterns {
    header: Regex,
    status_new: Regex,
    status_old: Regex,
    dates: Regex,
    refs: Regex,
    files: Regex,
    desc: Regex,
    checkpoint: Regex,
    last_session: Regex,
    context: Regex,
    blocked_by: Regex,
    tried: Regex,
    next: Regex,
}

impl BlockPatterns {
    fn new() -> Self {
        Self {
            header: Regex::new(r"^###\s*\[([A-Z]\d{3}|hf-[0-9a-f]{7})\]\s*(.+)$").unwrap(),
            status_new: Regex::new(
                r"^\s*-\s*\*\*Status\*\*:\s*(\w+)\s*\|\s*\*\*Phase\*\*:\s*([\w-]+)\s*\|\s*\*\*Agent\*\*:\s*([\w-]+)",
            )
            .unwrap(),
            status_old: Regex::new(
                r"^\s*-\s*\*\*Status\*\*:\s*(\w+)\s*\|\s*\*\*Created\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Updated\*\*:\s*(\d{4}-\d{2}-\d{2})",
            )
            .unwrap(),
            dates: Regex::new(
                r"^\s*-\s*\*\*Created\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Updated\*\*:\s*(\d{4}-\d{2}-\d{2})",
            )
            .unwrap(),
            refs: Regex::new(r"^\s*-\s*\*\*Refs\*\*:\s*(.*)$").unwrap(),
            files: Regex::new(r"^\s*-\s*\*\*Files\*\*:\s*(.*)$").unwrap(),
            desc: Regex::new(r"^\s*-\s*\*\*Description\*\*:\s*(.*)$").unwrap(),
            checkpoint: Regex::new(r"^\s*-\s*\*\*Checkpoint\*\*:\s*(.*)$").unwrap(),
            last_session: Regex::new(r"^\s*-\s*\*\*Last Session\*\*:\s*(\d{4}-\d{2}-\d{2})$")
                .unwrap(),
            context: Regex::new(r"^\s*-\s*\*\*Handoff\*\*\s*\(([^)]+)\):\s*$").unwrap(),
            blocked_by: Regex::new(r"^\s*-\s*\*\*Blocked By\*\*:\s*(.*)$").unwrap(),
            tried: Regex::new(r"^\s*\d+\.\s*\[(\w+)\]\s*(.+)$").unwrap(),
            next: Regex::new(r"^\*\*Next\*\*:\s*(.*)$").unwrap(),
        }
    }
}

/// Parse every handoff block in a file's content. Malformed blocks are
/// skipped; the scanner advances to the next `###` header.
pub fn parse_handoffs(content: &str) -> Vec<Handoff> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let pat = BlockPatterns::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut handoffs = Vec::new();
    let mut idx = 0;

    'blocks: while idx < lines.len() {
        let Some(header) = pat.header.captures(lines[idx]) else {
            idx += 1;
            continue;
        };

        let id = header.get(1).unwrap().as_str().to_string();
        let title = header.get(2).unwrap().as_str().trim().to_string();
        idx += 1;

        let Some(&status_line) = lines.get(idx) else {
            continue;
        };

        let status: HandoffStatus;
        let mut phase = Phase::Research;
        let mut agent = crate::models::Agent::User;
        let created: NaiveDate;
        let updated: NaiveDate;

        if let Some(m) = pat.status_new.captures(status_line) {
            let Ok(s) = m.get(1).unwrap().as_str().parse() else {
                continue;
            };
            status = s;
            if let Ok(p) = m.get(2).unwrap().as_str().parse() {
                phase = p;
            }
            if let Ok(a) = m.get(3).unwrap().as_str().parse() {
                agent = a;
            }
            idx += 1;

            // Dates live on the following line in the current grammar.
            let Some(dm) = lines.get(idx).and_then(|l| pat.dates.captures(l)) else {
                continue;
            };
            let (Ok(c), Ok(u)) = (
                NaiveDate::parse_from_str(dm.get(1).unwrap().as_str(), "%Y-%m-%d"),
                NaiveDate::parse_from_str(dm.get(2).unwrap().as_str(), "%Y-%m-%d"),
            ) else {
                continue;
            };
            created = c;
            updated = u;
            idx += 1;
        } else if let Some(m) = pat.status_old.captures(status_line) {
            let Ok(s) = m.get(1).unwrap().as_str().parse() else {
                continue;
            };
            status = s;
            let (Ok(c), Ok(u)) = (
                NaiveDate::parse_from_str(m.get(2).unwrap().as_str(), "%Y-%m-%d"),
                NaiveDate::parse_from_str(m.get(3).unwrap().as_str(), "%Y-%m-%d"),
            ) else {
                continue;
            };
            created = c;
            updated = u;
            idx += 1;
        } else {
            continue;
        }

        // Refs (current, pipe-separated) or Files (legacy, comma-separated).
        let mut refs = Vec::new();
        if let Some(line) = lines.get(idx) {
            if let Some(m) = pat.refs.captures(line) {
                refs = split_list(m.get(1).unwrap().as_str(), '|');
                idx += 1;
            } else if let Some(m) = pat.files.captures(line) {
                refs = split_list(m.get(1).unwrap().as_str(), ',');
                idx += 1;
            }
        }

        let mut description = String::new();
        if let Some(m) = lines.get(idx).and_then(|l| pat.desc.captures(l)) {
            description = m.get(1).unwrap().as_str().trim().to_string();
            idx += 1;
        }

        let mut checkpoint = String::new();
        if let Some(m) = lines.get(idx).and_then(|l| pat.checkpoint.captures(l)) {
            checkpoint = m.get(1).unwrap().as_str().trim().to_string();
            idx += 1;
        }

        let mut last_session = None;
        if let Some(m) = lines.get(idx).and_then(|l| pat.last_session.captures(l)) {
            last_session =
                NaiveDate::parse_from_str(m.get(1).unwrap().as_str(), "%Y-%m-%d").ok();
            idx += 1;
        }

        let mut context = None;
        if let Some(m) = lines.get(idx).and_then(|l| pat.context.captures(l)) {
            let git_ref = m.get(1).unwrap().as_str().trim().to_string();
            idx += 1;

            let mut ctx = HandoffContext {
                git_ref,
                ..Default::default()
            };
            while idx < lines.len() {
                let line = lines[idx].trim();
                if let Some(rest) = line.strip_prefix("- Summary:") {
                    ctx.summary = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("- Refs:") {
                    ctx.critical_files = split_list(rest, '|');
                } else if let Some(rest) = line.strip_prefix("- Changes:") {
                    ctx.recent_changes = split_list(rest, '|');
                } else if let Some(rest) = line.strip_prefix("- Learnings:") {
                    ctx.learnings = split_list(rest, '|');
                } else if let Some(rest) = line.strip_prefix("- Blockers:") {
                    ctx.blockers = split_list(rest, '|');
                } else {
                    break;
                }
                idx += 1;
            }

            if !ctx.is_empty() {
                context = Some(ctx);
            }
        }

        let mut blocked_by = Vec::new();
        if let Some(m) = lines.get(idx).and_then(|l| pat.blocked_by.captures(l)) {
            blocked_by = split_list(m.get(1).unwrap().as_str(), ',');
            idx += 1;
        }

        // Tried section.
        let mut tried = Vec::new();
        while idx < lines.len() && !lines[idx].trim().starts_with("**Tried**") {
            if pat.header.is_match(lines[idx]) {
                // Ran into the next block without a Tried section.
                push_handoff(
                    &mut handoffs, id, title, status, phase, agent, created, updated, refs,
                    description, tried, String::new(), checkpoint, last_session, context,
                    blocked_by,
                );
                continue 'blocks;
            }
            idx += 1;
        }
        if idx < lines.len() {
            idx += 1;
            while idx < lines.len() {
                let line = lines[idx].trim();
                if line.is_empty() || line.starts_with("**Next**:") || line == "---" {
                    break;
                }
                if let Some(m) = pat.tried.captures(lines[idx]) {
                    if let Ok(outcome) = m.get(1).unwrap().as_str().parse() {
                        tried.push(TriedStep {
                            outcome,
                            description: m.get(2).unwrap().as_str().trim().to_string(),
                        });
                    }
                }
                idx += 1;
            }
        }

        // Next steps.
        let mut next_steps = String::new();
        while idx < lines.len() && !lines[idx].trim().starts_with("**Next**") {
            idx += 1;
        }
        if idx < lines.len() {
            if let Some(m) = pat.next.captures(lines[idx].trim()) {
                next_steps = m.get(1).unwrap().as_str().trim().to_string();
            }
            idx += 1;
        }

        // Skip to the separator and one past it.
        while idx < lines.len() && lines[idx].trim() != "---" {
            idx += 1;
        }
        idx += 1;

        push_handoff(
            &mut handoffs, id, title, status, phase, agent, created, updated, refs, description,
            tried, next_steps, checkpoint, last_session, context, blocked_by,
        );
    }

    handoffs
}

#[allow(clippy::too_many_arguments)]
fn push_handoff(
    handoffs: &mut Vec<Handoff>,
    id: String,
    title: String,
    status: HandoffStatus,
    phase: Phase,
    agent: crate::models::Agent,
    created: NaiveDate,
    updated: NaiveDate,
    refs: Vec<String>,
    description: String,
    tried: Vec<TriedStep>,
    next_steps: String,
    checkpoint: String,
    last_session: Option<NaiveDate>,
    handoff: Option<HandoffContext>,
    blocked_by: Vec<String>,
) {
    handoffs.push(Handoff {
        id,
        title,
        status,
        phase,
        agent,
        created,
        updated,
        refs,
        description,
        tried,
        next_steps,
        checkpoint,
        last_session,
        handoff,
        blocked_by,
    });
}

fn split_list(s: &str, sep: char) -> Vec<String> {
    s.split(sep)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Format a handoff in the current grammar.
pub fn format_handoff(handoff: &Handoff) -> String {
    let mut lines = vec![
        format!("### [{}] {}", handoff.id, handoff.title),
        format!(
            "- **Status**: {} | **Phase**: {} | **Agent**: {}",
            handoff.status, handoff.phase, handoff.agent
        ),
        format!(
            "- **Created**: {} | **Updated**: {}",
            handoff.created.format("%Y-%m-%d"),
            handoff.updated.format("%Y-%m-%d")
        ),
        format!("- **Refs**: {}", handoff.refs.join(" | ")),
        format!("- **Description**: {}", handoff.description),
    ];

    if !handoff.checkpoint.is_empty() {
        lines.push(format!("- **Checkpoint**: {}", handoff.checkpoint));
        if let Some(session) = handoff.last_session {
            lines.push(format!("- **Last Session**: {}", session.format("%Y-%m-%d")));
        }
    }

    if let Some(ctx) = &handoff.handoff {
        lines.push(format!("- **Handoff** ({}):", ctx.git_ref));
        lines.push(format!("  - Summary: {}", ctx.summary));
        if !ctx.critical_files.is_empty() {
            lines.push(format!("  - Refs: {}", ctx.critical_files.join(" | ")));
        }
        if !ctx.recent_changes.is_empty() {
            lines.push(format!("  - Changes: {}", ctx.recent_changes.join(" | ")));
        }
        if !ctx.learnings.is_empty() {
            lines.push(format!("  - Learnings: {}", ctx.learnings.join(" | ")));
        }
        if !ctx.blockers.is_empty() {
            lines.push(format!("  - Blockers: {}", ctx.blockers.join(" | ")));
        }
    }

    if !handoff.blocked_by.is_empty() {
        lines.push(format!("- **Blocked By**: {}", handoff.blocked_by.join(", ")));
    }

    lines.push(String::new());
    lines.push("**Tried**:".to_string());
    for (i, step) in handoff.tried.iter().enumerate() {
        lines.push(format!("{}. [{}] {}", i + 1, step.outcome, step.description));
    }

    lines.push(String::new());
    lines.push(format!("**Next**: {}", handoff.next_steps));
    lines.push(String::new());
    lines.push("---".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Agent, TriedOutcome};
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_handoff() -> Handoff {
        Handoff {
            id: "hf-a1b2c3d".to_string(),
            title: "Websocket reconnect".to_string(),
            status: HandoffStatus::InProgress,
            phase: Phase::Implementing,
            agent: Agent::GeneralPurpose,
            created: day(2025, 3, 1),
            updated: day(2025, 3, 4),
            refs: vec!["net/ws.rs:120".to_string(), "net/backoff.rs:8-40".to_string()],
            description: "Reconnect drops queued frames".to_string(),
            tried: vec![
                TriedStep {
                    outcome: TriedOutcome::Fail,
                    description: "Retry loop without backoff".to_string(),
                },
                TriedStep {
                    outcome: TriedOutcome::Success,
                    description: "Exponential backoff with jitter".to_string(),
                },
            ],
            next_steps: "Flush queue after handshake".to_string(),
            checkpoint: "Backoff landed, queue flush pending".to_string(),
            last_session: Some(day(2025, 3, 4)),
            handoff: Some(HandoffContext {
                summary: "Backoff in place".to_string(),
                critical_files: vec!["net/ws.rs:120".to_string()],
                recent_changes: vec!["added jitter".to_string()],
                learnings: vec!["server closes idle at 30s".to_string()],
                blockers: vec![],
                git_ref: "abc1234def5678".to_string(),
            }),
            blocked_by: vec!["hf-0000001".to_string()],
        }
    }

    #[test]
    fn test_round_trip() {
        let handoff = sample_handoff();
        let formatted = format_handoff(&handoff);
        let parsed = parse_handoffs(&formatted);
        assert_eq!(parsed, vec![handoff]);
    }

    #[test]
    fn test_round_trip_minimal() {
        let handoff = Handoff {
            id: "A007".to_string(),
            title: "Plain".to_string(),
            status: HandoffStatus::NotStarted,
            phase: Phase::Research,
            agent: Agent::User,
            created: day(2025, 1, 1),
            updated: day(2025, 1, 1),
            refs: vec![],
            description: String::new(),
            tried: vec![],
            next_steps: String::new(),
            checkpoint: String::new(),
            last_session: None,
            handoff: None,
            blocked_by: vec![],
        };
        let parsed = parse_handoffs(&format_handoff(&handoff));
        assert_eq!(parsed, vec![handoff]);
    }

    #[test]
    fn test_legacy_status_line_and_files() {
        let content = "### [A003] Old style entry\n\
                       - **Status**: in_progress | **Created**: 2024-11-02 | **Updated**: 2024-11-05\n\
                       - **Files**: src/app.py, src/db.py\n\
                       - **Description**: Carried over from the old tool\n\
                       \n\
                       **Tried**:\n\
                       1. [partial] Split the module\n\
                       \n\
                       **Next**: Finish the split\n\
                       \n\
                       ---\n";
        let parsed = parse_handoffs(content);
        assert_eq!(parsed.len(), 1);
        let h = &parsed[0];
        assert_eq!(h.id, "A003");
        assert_eq!(h.status, HandoffStatus::InProgress);
        assert_eq!(h.phase, Phase::Research);
        assert_eq!(h.agent, Agent::User);
        assert_eq!(h.refs, vec!["src/app.py", "src/db.py"]);
        assert_eq!(h.tried[0].outcome, TriedOutcome::Partial);

        // Legacy input re-serializes to the current grammar.
        let reformatted = format_handoff(h);
        assert!(reformatted.contains("- **Status**: in_progress | **Phase**: research | **Agent**: user"));
        assert!(reformatted.contains("- **Refs**: src/app.py | src/db.py"));
    }

    #[test]
    fn test_malformed_block_skipped() {
        let content = "### [hf-badbad1] Broken\n\
                       - **Status**: nonsense | **Phase**: research | **Agent**: user\n\
                       - **Created**: 2025-01-01 | **Updated**: 2025-01-01\n\
                       \n\
                       ---\n\
                       \n\
                       ### [hf-1234567] Fine\n\
                       - **Status**: not_started | **Phase**: research | **Agent**: user\n\
                       - **Created**: 2025-01-01 | **Updated**: 2025-01-01\n\
                       - **Refs**: \n\
                       - **Description**: ok\n\
                       \n\
                       **Tried**:\n\
                       \n\
                       **Next**: \n\
                       \n\
                       ---\n";
        let parsed = parse_handoffs(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "hf-1234567");
    }

    #[test]
    fn test_validate_ref() {
        assert!(validate_ref("core/main.rs:42"));
        assert!(validate_ref("core/main.rs:50-75"));
        assert!(!validate_ref("core/main.rs"));
        assert!(!validate_ref("core main.rs:42"));
        assert!(!validate_ref("a:b:42"));
        assert!(!validate_ref(":42"));
    }

    #[test]
    fn test_blocked_by_parsed() {
        let mut handoff = sample_handoff();
        handoff.blocked_by = vec!["A001".to_string(), "hf-2222222".to_string()];
        let parsed = parse_handoffs(&format_handoff(&handoff));
        assert_eq!(parsed[0].blocked_by, handoff.blocked_by);
    }
}
