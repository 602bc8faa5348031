//! Handoff subcommand handlers.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::models::constants::HandoffPolicy;
use crate::models::{
    Agent, HandoffContext, HandoffStatus, Phase, RecallError, TodoItem, TriedOutcome,
};
use crate::store::{HandoffOps, Recall};

/// Field updates collected from `handoff update` flags.
pub struct UpdateArgs {
    pub status: Option<String>,
    pub tried: Option<Vec<String>>,
    pub next: Option<String>,
    pub refs: Option<String>,
    pub desc: Option<String>,
    pub phase: Option<String>,
    pub agent: Option<String>,
    pub checkpoint: Option<String>,
    pub blocked_by: Option<String>,
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn add(
    store: &Recall,
    title: &str,
    desc: Option<&str>,
    refs: Option<&str>,
    phase: &str,
    agent: &str,
) -> Result<()> {
    let phase: Phase = phase.parse()?;
    let agent: Agent = agent.parse()?;
    let refs = refs.map(split_csv).unwrap_or_default();

    let handoff_id = store.handoff_add(title, desc, refs, phase, agent)?;
    println!("Added handoff {handoff_id}: {title}");
    Ok(())
}

pub fn update(store: &Recall, id: &str, args: UpdateArgs) -> Result<()> {
    let mut updated = false;

    if let Some(status) = args.status {
        let status: HandoffStatus = status.parse()?;
        store.handoff_update_status(id, status)?;
        println!("Updated {id} status to {status}");
        updated = true;
    }
    if let Some(tried) = args.tried {
        let outcome: TriedOutcome = tried[0].parse()?;
        store.handoff_add_tried(id, outcome, &tried[1])?;
        println!("Added tried step to {id}");
        updated = true;
    }
    if let Some(next) = args.next {
        store.handoff_update_next(id, &next)?;
        println!("Updated {id} next steps");
        updated = true;
    }
    if let Some(refs) = args.refs {
        store.handoff_update_refs(id, split_csv(&refs))?;
        println!("Updated {id} refs");
        updated = true;
    }
    if let Some(desc) = args.desc {
        store.handoff_update_desc(id, &desc)?;
        println!("Updated {id} description");
        updated = true;
    }
    if let Some(phase) = args.phase {
        let phase: Phase = phase.parse()?;
        store.handoff_update_phase(id, phase)?;
        println!("Updated {id} phase to {phase}");
        updated = true;
    }
    if let Some(agent) = args.agent {
        let agent: Agent = agent.parse()?;
        store.handoff_update_agent(id, agent)?;
        println!("Updated {id} agent to {agent}");
        updated = true;
    }
    if let Some(checkpoint) = args.checkpoint {
        store.handoff_update_checkpoint(id, &checkpoint)?;
        println!("Updated {id} checkpoint");
        updated = true;
    }
    if let Some(blocked_by) = args.blocked_by {
        store.handoff_update_blocked_by(id, split_csv(&blocked_by))?;
        println!("Updated {id} dependencies");
        updated = true;
    }

    if !updated {
        bail!("No update options provided");
    }
    Ok(())
}

pub fn complete(store: &Recall, id: &str) -> Result<()> {
    let result = store.handoff_complete(id)?;
    println!("Completed {id}");
    println!("\n{}", result.extraction_prompt);
    Ok(())
}

pub fn archive(store: &Recall, id: &str) -> Result<()> {
    store.handoff_archive(id)?;
    println!("Archived {id}");
    Ok(())
}

pub fn delete(store: &Recall, id: &str) -> Result<()> {
    store.handoff_delete(id)?;
    println!("Deleted {id}");
    Ok(())
}

pub fn list(store: &Recall, status: Option<&str>, include_completed: bool) -> Result<()> {
    let status = status.map(|s| s.parse::<HandoffStatus>()).transpose()?;
    let handoffs = store.handoff_list(status, include_completed)?;

    if handoffs.is_empty() {
        println!("(no handoffs found)");
        return Ok(());
    }

    for handoff in &handoffs {
        println!("[{}] {}", handoff.id, handoff.title);
        println!(
            "    Status: {} | Phase: {} | Created: {} | Updated: {}",
            handoff.status, handoff.phase, handoff.created, handoff.updated
        );
        if !handoff.refs.is_empty() {
            println!("    Refs: {}", handoff.refs.join(", "));
        }
        if !handoff.description.is_empty() {
            println!("    Description: {}", handoff.description);
        }
    }
    println!("\nTotal: {} handoff(s)", handoffs.len());
    Ok(())
}

pub fn show(store: &Recall, id: &str) -> Result<()> {
    let handoff = store
        .handoff_get(id)?
        .ok_or_else(|| RecallError::not_found("Handoff", id))?;

    println!("### [{}] {}", handoff.id, handoff.title);
    println!(
        "- **Status**: {} | **Phase**: {} | **Agent**: {}",
        handoff.status, handoff.phase, handoff.agent
    );
    println!("- **Created**: {}", handoff.created);
    println!("- **Updated**: {}", handoff.updated);
    let refs = if handoff.refs.is_empty() {
        "(none)".to_string()
    } else {
        handoff.refs.join(", ")
    };
    println!("- **Refs**: {refs}");
    let desc = if handoff.description.is_empty() {
        "(none)"
    } else {
        &handoff.description
    };
    println!("- **Description**: {desc}");
    if !handoff.checkpoint.is_empty() {
        let session_info = handoff
            .last_session
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        println!("- **Checkpoint{session_info}**: {}", handoff.checkpoint);
    }
    if let Some(ctx) = &handoff.handoff {
        println!("- **Handoff** ({}):", ctx.git_ref);
        println!("  - Summary: {}", ctx.summary);
    }
    if !handoff.blocked_by.is_empty() {
        println!("- **Blocked By**: {}", handoff.blocked_by.join(", "));
    }
    println!();
    println!("**Tried**:");
    if handoff.tried.is_empty() {
        println!("(none)");
    } else {
        for (i, step) in handoff.tried.iter().enumerate() {
            println!("{}. [{}] {}", i + 1, step.outcome, step.description);
        }
    }
    println!();
    let next = if handoff.next_steps.is_empty() {
        "(none)"
    } else {
        &handoff.next_steps
    };
    println!("**Next**: {next}");
    Ok(())
}

pub fn inject(store: &Recall) -> Result<()> {
    let output = store.handoff_inject(&HandoffPolicy::default())?;
    if output.is_empty() {
        println!("(no active handoffs)");
    } else {
        println!("{output}");
    }
    Ok(())
}

pub fn sync_todos(store: &Recall, todos_json: &str) -> Result<()> {
    let todos: Vec<TodoItem> = serde_json::from_str(todos_json)
        .map_err(|e| RecallError::Validation(format!("Invalid JSON: {e}")))?;

    if let Some(handoff_id) = store.handoff_sync_todos(&todos)? {
        println!("Synced {} todo(s) to handoff {handoff_id}", todos.len());
    }
    Ok(())
}

pub fn inject_todos(store: &Recall) -> Result<()> {
    let output = store.handoff_inject_todos()?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

pub fn ready(store: &Recall) -> Result<()> {
    let ready_handoffs = store.handoff_ready()?;
    if ready_handoffs.is_empty() {
        println!("(no ready handoffs)");
        return Ok(());
    }

    for handoff in &ready_handoffs {
        let indicator = if handoff.status == HandoffStatus::InProgress {
            "[*]"
        } else {
            "[ ]"
        };
        println!("{indicator} [{}] {}", handoff.id, handoff.title);
        println!(
            "    Status: {} | Phase: {} | Updated: {}",
            handoff.status, handoff.phase, handoff.updated
        );
        if !handoff.blocked_by.is_empty() {
            println!(
                "    Blocked by: {} (all completed)",
                handoff.blocked_by.join(", ")
            );
        }
    }
    println!("\nReady: {} handoff(s)", ready_handoffs.len());
    Ok(())
}

pub fn set_context(store: &Recall, id: &str, context_json: &str) -> Result<()> {
    let context: HandoffContext = serde_json::from_str(context_json)
        .map_err(|e| RecallError::Validation(format!("Invalid JSON: {e}")))?;

    let git_ref = context.git_ref.clone();
    store.handoff_update_context(id, context)?;
    println!("Set context for {id} (git ref: {git_ref})");
    Ok(())
}

pub fn resume(store: &Recall, id: &str) -> Result<()> {
    let result = store.handoff_resume(id)?;

    println!("Resuming [{}] {}", result.handoff.id, result.handoff.title);
    println!(
        "- Status: {} | Phase: {} | Updated: {}",
        result.handoff.status, result.handoff.phase, result.handoff.updated
    );
    if let Some(ctx) = &result.context {
        if !ctx.summary.is_empty() {
            println!("- Summary: {}", ctx.summary);
        }
    }

    for warning in &result.validation.warnings {
        println!("{} {}", "⚠️".yellow(), warning);
    }
    for error in &result.validation.errors {
        println!("{} {}", "✗".red(), error);
    }

    if result.validation.valid {
        println!("{}", "Codebase state OK - safe to resume".green());
    } else {
        println!("{}", "Validation failed - review errors before resuming".red());
    }
    Ok(())
}
