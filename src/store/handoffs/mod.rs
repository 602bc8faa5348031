//! Handoff store operations.
//!
//! Handoffs live in two project files, active and archive, with legacy
//! filename aliases resolved by `fs::paths`. New ids are hash-based
//! (`hf-<7-hex>`) so concurrent agents cannot collide; legacy sequential
//! `A###` ids are still honored on read, and the archive is consulted when
//! allocating them so ids are never reused.

mod inject;
mod resume;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::models::constants::{
    HandoffPolicy, COMPLETION_PATTERNS, IMPLEMENTING_KEYWORDS, IMPLEMENTING_STEP_THRESHOLD,
};
use crate::models::{
    Agent, CompleteResult, Handoff, HandoffContext, HandoffStatus, Phase, RecallError,
    ResumeResult, TodoItem, TriedOutcome, TriedStep,
};
use crate::parser::{format_handoff, parse_handoffs, validate_ref};

use super::{HandoffOps, Recall};

const HANDOFFS_HEADER: &str = "# HANDOFFS.md - Active Work Tracking\n\n\
    > Track ongoing work with tried steps and next steps.\n\
    > When completed, review for lessons to extract.\n\n\
    ## Active Handoffs\n";

const ARCHIVE_HEADER: &str = "# HANDOFFS_ARCHIVE.md - Archived Handoffs\n\n\
    > Previously completed or archived handoffs.\n";

impl HandoffOps for Recall {
    fn handoff_add(
        &self,
        title: &str,
        desc: Option<&str>,
        refs: Vec<String>,
        phase: Phase,
        agent: Agent,
    ) -> Result<String> {
        for r in &refs {
            if !validate_ref(r) {
                return Err(RecallError::Validation(format!(
                    "Invalid ref: {r}. Use path:line or path:start-end"
                ))
                .into());
            }
        }

        self.init_handoffs_file()?;
        let file_path = self.handoffs_file();

        let handoff_id;
        {
            let _lock = self.lock_file(&file_path)?;
            let mut handoffs = self.read_handoffs(&file_path)?;
            handoff_id = generate_handoff_id(title);
            let today = Self::today();

            handoffs.push(Handoff {
                id: handoff_id.clone(),
                title: title.to_string(),
                status: HandoffStatus::NotStarted,
                phase,
                agent,
                created: today,
                updated: today,
                refs,
                description: desc.unwrap_or_default().to_string(),
                tried: Vec::new(),
                next_steps: String::new(),
                checkpoint: String::new(),
                last_session: None,
                handoff: None,
                blocked_by: Vec::new(),
            });

            self.write_handoffs_file(&handoffs)?;
        }

        self.logger().handoff_created(
            &handoff_id,
            title,
            &phase.to_string(),
            &agent.to_string(),
        );

        Ok(handoff_id)
    }

    fn handoff_get(&self, handoff_id: &str) -> Result<Option<Handoff>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(None);
        }
        let handoffs = self.read_handoffs(&file_path)?;
        Ok(handoffs.into_iter().find(|h| h.id == handoff_id))
    }

    fn handoff_update_status(&self, handoff_id: &str, status: HandoffStatus) -> Result<()> {
        let old = self.modify_handoff(handoff_id, |h| {
            let old = h.status;
            h.status = status;
            old
        })?;
        self.logger().handoff_change(
            handoff_id,
            "status_change",
            Some(&old.to_string()),
            Some(&status.to_string()),
        );
        Ok(())
    }

    fn handoff_update_phase(&self, handoff_id: &str, phase: Phase) -> Result<()> {
        let old = self.modify_handoff(handoff_id, |h| {
            let old = h.phase;
            h.phase = phase;
            old
        })?;
        self.logger().handoff_change(
            handoff_id,
            "phase_change",
            Some(&old.to_string()),
            Some(&phase.to_string()),
        );
        Ok(())
    }

    fn handoff_update_agent(&self, handoff_id: &str, agent: Agent) -> Result<()> {
        let old = self.modify_handoff(handoff_id, |h| {
            let old = h.agent;
            h.agent = agent;
            old
        })?;
        self.logger().handoff_change(
            handoff_id,
            "agent_change",
            Some(&old.to_string()),
            Some(&agent.to_string()),
        );
        Ok(())
    }

    fn handoff_update_next(&self, handoff_id: &str, text: &str) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.next_steps = text.to_string();
        })?;
        self.logger()
            .handoff_change(handoff_id, "next_change", None, None);
        Ok(())
    }

    fn handoff_update_refs(&self, handoff_id: &str, refs: Vec<String>) -> Result<()> {
        for r in &refs {
            if !validate_ref(r) {
                return Err(RecallError::Validation(format!(
                    "Invalid ref: {r}. Use path:line or path:start-end"
                ))
                .into());
            }
        }
        self.modify_handoff(handoff_id, |h| {
            h.refs = refs;
        })?;
        self.logger()
            .handoff_change(handoff_id, "refs_change", None, None);
        Ok(())
    }

    fn handoff_update_desc(&self, handoff_id: &str, description: &str) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.description = description.to_string();
        })?;
        self.logger()
            .handoff_change(handoff_id, "desc_change", None, None);
        Ok(())
    }

    fn handoff_update_checkpoint(&self, handoff_id: &str, checkpoint: &str) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.checkpoint = checkpoint.to_string();
            h.last_session = Some(Self::today());
        })?;
        self.logger()
            .handoff_change(handoff_id, "checkpoint_change", None, None);
        Ok(())
    }

    fn handoff_update_context(&self, handoff_id: &str, context: HandoffContext) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.handoff = Some(context);
            h.last_session = Some(Self::today());
        })?;
        self.logger()
            .handoff_change(handoff_id, "context_change", None, None);
        Ok(())
    }

    fn handoff_update_blocked_by(&self, handoff_id: &str, blocked_by: Vec<String>) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.blocked_by = blocked_by;
        })?;
        self.logger()
            .handoff_change(handoff_id, "blocked_by_change", None, None);
        Ok(())
    }

    fn handoff_add_tried(
        &self,
        handoff_id: &str,
        outcome: TriedOutcome,
        description: &str,
    ) -> Result<()> {
        self.modify_handoff(handoff_id, |h| {
            h.tried.push(TriedStep {
                outcome,
                description: description.to_string(),
            });

            // Rule 1: a successful "final"/"done"-style step closes the work.
            if outcome == TriedOutcome::Success {
                let desc_lower = description.to_lowercase();
                let desc_lower = desc_lower.trim();
                if COMPLETION_PATTERNS
                    .iter()
                    .any(|p| desc_lower.starts_with(p))
                {
                    h.status = HandoffStatus::Completed;
                    h.phase = Phase::Review;
                }
            }

            // Rule 2: implementing-flavored activity bumps the phase, but
            // never regresses one already in implementing or review.
            if !h.phase.is_protected() {
                let desc_lower = description.to_lowercase();
                let keyword_hit = IMPLEMENTING_KEYWORDS
                    .iter()
                    .any(|kw| desc_lower.contains(kw));
                if keyword_hit || h.success_count() >= IMPLEMENTING_STEP_THRESHOLD {
                    h.phase = Phase::Implementing;
                }
            }
        })?;

        self.logger().handoff_change(
            handoff_id,
            "tried_added",
            None,
            Some(&outcome.to_string()),
        );
        Ok(())
    }

    fn handoff_complete(&self, handoff_id: &str) -> Result<CompleteResult> {
        let target = {
            let file_path = self.handoffs_file();
            let _lock = self.lock_file(&file_path)?;
            let mut handoffs = self.read_handoffs(&file_path)?;

            let target = handoffs
                .iter_mut()
                .find(|h| h.id == handoff_id)
                .ok_or_else(|| RecallError::not_found("Handoff", handoff_id))?;
            target.status = HandoffStatus::Completed;
            target.updated = Self::today();
            let snapshot = target.clone();

            self.write_handoffs_file(&handoffs)?;
            snapshot
        };

        let tried_summary = if target.tried.is_empty() {
            "(none)".to_string()
        } else {
            target
                .tried
                .iter()
                .map(|t| format!("- [{}] {}", t.outcome, t.description))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let refs_summary = if target.refs.is_empty() {
            "(none)".to_string()
        } else {
            target.refs.join(", ")
        };

        let extraction_prompt = format!(
            "Review this completed handoff for potential lessons to extract:\n\n\
             **Title**: {}\n\
             **Description**: {}\n\n\
             **Tried steps**:\n{}\n\n\
             **Files affected**: {}\n\n\
             Consider extracting lessons about:\n\
             1. What worked and why\n\
             2. What didn't work and why\n\
             3. Patterns or gotchas discovered\n\
             4. Decisions made and their rationale\n",
            target.title, target.description, tried_summary, refs_summary
        );

        let duration_days = (Self::today() - target.created).num_days();
        self.logger()
            .handoff_completed(handoff_id, target.tried.len(), Some(duration_days));

        Ok(CompleteResult {
            handoff: target,
            extraction_prompt,
        })
    }

    fn handoff_archive(&self, handoff_id: &str) -> Result<()> {
        let file_path = self.handoffs_file();
        let _lock = self.lock_file(&file_path)?;
        let handoffs = self.read_handoffs(&file_path)?;

        let mut target = None;
        let mut remaining = Vec::new();
        for handoff in handoffs {
            if handoff.id == handoff_id {
                target = Some(handoff);
            } else {
                remaining.push(handoff);
            }
        }
        let target = target.ok_or_else(|| RecallError::not_found("Handoff", handoff_id))?;

        self.append_to_archive(&[target])?;
        self.write_handoffs_file(&remaining)?;
        self.logger().mutation("archive", handoff_id, json!({}));
        Ok(())
    }

    fn handoff_delete(&self, handoff_id: &str) -> Result<()> {
        let file_path = self.handoffs_file();
        let _lock = self.lock_file(&file_path)?;
        let mut handoffs = self.read_handoffs(&file_path)?;

        let before = handoffs.len();
        handoffs.retain(|h| h.id != handoff_id);
        if handoffs.len() == before {
            return Err(RecallError::not_found("Handoff", handoff_id).into());
        }

        self.write_handoffs_file(&handoffs)?;
        self.logger().mutation("delete", handoff_id, json!({}));
        Ok(())
    }

    fn handoff_list(
        &self,
        status_filter: Option<HandoffStatus>,
        include_completed: bool,
    ) -> Result<Vec<Handoff>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }
        let mut handoffs = self.read_handoffs(&file_path)?;

        if let Some(status) = status_filter {
            handoffs.retain(|h| h.status == status);
        } else if !include_completed {
            handoffs.retain(|h| h.status != HandoffStatus::Completed);
        }

        Ok(handoffs)
    }

    /// Hybrid visibility: a completed handoff shows when it is within the
    /// top `max_completed` by recency OR updated within `max_age_days`.
    fn handoff_list_completed(&self, policy: &HandoffPolicy) -> Result<Vec<Handoff>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let mut completed: Vec<Handoff> = self
            .read_handoffs(&file_path)?
            .into_iter()
            .filter(|h| h.status == HandoffStatus::Completed)
            .collect();
        if completed.is_empty() {
            return Ok(Vec::new());
        }

        completed.sort_by(|a, b| b.updated.cmp(&a.updated));
        let cutoff = Self::today() - Duration::days(policy.max_age_days);

        Ok(completed
            .into_iter()
            .enumerate()
            .filter(|(i, h)| *i < policy.max_completed || h.updated >= cutoff)
            .map(|(_, h)| h)
            .collect())
    }

    fn handoff_inject(&self, policy: &HandoffPolicy) -> Result<String> {
        self.inject_impl(policy)
    }

    fn handoff_sync_todos(&self, todos: &[TodoItem]) -> Result<Option<String>> {
        self.sync_todos_impl(todos)
    }

    fn handoff_inject_todos(&self) -> Result<String> {
        self.inject_todos_impl()
    }

    fn handoff_ready(&self) -> Result<Vec<Handoff>> {
        self.ready_impl()
    }

    fn handoff_resume(&self, handoff_id: &str) -> Result<ResumeResult> {
        self.resume_impl(handoff_id)
    }
}

impl Recall {
    fn init_handoffs_file(&self) -> Result<()> {
        let file_path = self.handoffs_file();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create: {}", parent.display()))?;
        }
        if file_path.exists() {
            return Ok(());
        }
        fs::write(&file_path, format!("{HANDOFFS_HEADER}\n"))
            .with_context(|| format!("Failed to create: {}", file_path.display()))?;
        Ok(())
    }

    fn read_handoffs(&self, file_path: &Path) -> Result<Vec<Handoff>> {
        if !file_path.exists() {
            return Ok(Vec::new());
        }
        let start = std::time::Instant::now();
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read: {}", file_path.display()))?;
        let handoffs = parse_handoffs(&content);
        self.logger()
            .file_io("read", file_path, start.elapsed().as_secs_f64() * 1000.0);
        Ok(handoffs)
    }

    fn write_handoffs_file(&self, handoffs: &[Handoff]) -> Result<()> {
        self.init_handoffs_file()?;
        let file_path = self.handoffs_file();
        let start = std::time::Instant::now();

        let mut out = format!("{HANDOFFS_HEADER}\n");
        for handoff in handoffs {
            out.push_str(&format_handoff(handoff));
            out.push_str("\n\n");
        }

        fs::write(&file_path, out)
            .with_context(|| format!("Failed to write: {}", file_path.display()))?;
        self.logger()
            .file_io("write", &file_path, start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    fn append_to_archive(&self, handoffs: &[Handoff]) -> Result<()> {
        let archive = self.handoffs_archive();
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create: {}", parent.display()))?;
        }

        let mut content = if archive.exists() {
            fs::read_to_string(&archive)
                .with_context(|| format!("Failed to read: {}", archive.display()))?
        } else {
            format!("{ARCHIVE_HEADER}\n")
        };

        for handoff in handoffs {
            content.push('\n');
            content.push_str(&format_handoff(handoff));
            content.push('\n');
        }

        fs::write(&archive, content)
            .with_context(|| format!("Failed to write: {}", archive.display()))?;
        Ok(())
    }

    /// Lock, locate, mutate, stamp `updated`, rewrite. The closure's return
    /// value is handed back for change logging.
    fn modify_handoff<T>(
        &self,
        handoff_id: &str,
        f: impl FnOnce(&mut Handoff) -> T,
    ) -> Result<T> {
        let file_path = self.handoffs_file();
        let _lock = self.lock_file(&file_path)?;
        let mut handoffs = self.read_handoffs(&file_path)?;

        let target = handoffs
            .iter_mut()
            .find(|h| h.id == handoff_id)
            .ok_or_else(|| RecallError::not_found("Handoff", handoff_id))?;
        let out = f(target);
        target.updated = Self::today();

        self.write_handoffs_file(&handoffs)?;
        Ok(out)
    }

    /// Move stale active handoffs to the archive, prefixing a stale note.
    pub(crate) fn archive_stale_handoffs(&self, policy: &HandoffPolicy) -> Result<Vec<String>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let cutoff = Self::today() - Duration::days(policy.stale_days);
        let _lock = self.lock_file(&file_path)?;
        let handoffs = self.read_handoffs(&file_path)?;

        let mut stale = Vec::new();
        let mut remaining = Vec::new();
        for mut handoff in handoffs {
            if handoff.status != HandoffStatus::Completed && handoff.updated < cutoff {
                let note = format!("[Auto-archived: stale after {} days]", policy.stale_days);
                handoff.description = if handoff.description.is_empty() {
                    note
                } else {
                    format!("{note} {}", handoff.description)
                };
                stale.push(handoff);
            } else {
                remaining.push(handoff);
            }
        }

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = stale.iter().map(|h| h.id.clone()).collect();
        self.append_to_archive(&stale)?;
        self.write_handoffs_file(&remaining)?;
        Ok(ids)
    }

    /// Move long-completed handoffs to the archive.
    pub(crate) fn archive_old_completed_handoffs(
        &self,
        policy: &HandoffPolicy,
    ) -> Result<Vec<String>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let cutoff = Self::today() - Duration::days(policy.completed_archive_days);
        let _lock = self.lock_file(&file_path)?;
        let handoffs = self.read_handoffs(&file_path)?;

        let (old_completed, remaining): (Vec<Handoff>, Vec<Handoff>) = handoffs
            .into_iter()
            .partition(|h| h.status == HandoffStatus::Completed && h.updated < cutoff);

        if old_completed.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = old_completed.iter().map(|h| h.id.clone()).collect();
        self.append_to_archive(&old_completed)?;
        self.write_handoffs_file(&remaining)?;
        Ok(ids)
    }

    /// Next legacy sequential id. Both the active file and the archive are
    /// scanned so archived ids are never reissued.
    pub fn next_legacy_handoff_id(&self) -> Result<String> {
        let mut max_id = 0u32;

        let file_path = self.handoffs_file();
        if file_path.exists() {
            for handoff in self.read_handoffs(&file_path)? {
                if let Some(num) = handoff
                    .id
                    .strip_prefix('A')
                    .and_then(|n| n.parse::<u32>().ok())
                {
                    max_id = max_id.max(num);
                }
            }
        }

        let archive = self.handoffs_archive();
        if archive.exists() {
            let content = fs::read_to_string(&archive)
                .with_context(|| format!("Failed to read: {}", archive.display()))?;
            let re = regex::Regex::new(r"\[A(\d{3})\]").expect("valid regex");
            for cap in re.captures_iter(&content) {
                if let Ok(num) = cap[1].parse::<u32>() {
                    max_id = max_id.max(num);
                }
            }
        }

        Ok(format!("A{:03}", max_id + 1))
    }

    /// Test support: rewrite a handoff's updated date without stamping it.
    pub fn set_handoff_updated(&self, handoff_id: &str, updated: chrono::NaiveDate) -> Result<()> {
        let file_path = self.handoffs_file();
        let _lock = self.lock_file(&file_path)?;
        let mut handoffs = self.read_handoffs(&file_path)?;
        if let Some(handoff) = handoffs.iter_mut().find(|h| h.id == handoff_id) {
            handoff.updated = updated;
        }
        self.write_handoffs_file(&handoffs)
    }

    /// Test support: rewrite a handoff's last-session date.
    pub fn set_handoff_last_session(
        &self,
        handoff_id: &str,
        last_session: chrono::NaiveDate,
    ) -> Result<()> {
        let file_path = self.handoffs_file();
        let _lock = self.lock_file(&file_path)?;
        let mut handoffs = self.read_handoffs(&file_path)?;
        if let Some(handoff) = handoffs.iter_mut().find(|h| h.id == handoff_id) {
            handoff.last_session = Some(last_session);
        }
        self.write_handoffs_file(&handoffs)
    }
}

/// Hash-based id: first 7 hex of SHA-256 over `title:iso_now`.
fn generate_handoff_id(title: &str) -> String {
    let seed = format!("{title}:{}", Local::now().to_rfc3339());
    let digest = Sha256::digest(seed.as_bytes());
    format!("hf-{}", &hex::encode(digest)[..7])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EventLogger;
    use tempfile::TempDir;

    fn store() -> (TempDir, Recall) {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let project = temp.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let recall = Recall::with_logger(base, project, EventLogger::disabled());
        (temp, recall)
    }

    fn add(recall: &Recall, title: &str) -> String {
        recall
            .handoff_add(title, None, vec![], Phase::Research, Agent::User)
            .unwrap()
    }

    #[test]
    fn test_add_generates_hash_id() {
        let (_temp, recall) = store();
        let id = add(&recall, "First piece of work");
        assert!(id.starts_with("hf-"));
        assert_eq!(id.len(), 10);

        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.status, HandoffStatus::NotStarted);
        assert_eq!(handoff.phase, Phase::Research);
        assert_eq!(handoff.created, Recall::today());
    }

    #[test]
    fn test_add_rejects_malformed_refs() {
        let (_temp, recall) = store();
        let err = recall
            .handoff_add(
                "Bad refs",
                None,
                vec!["not a ref".to_string()],
                Phase::Research,
                Agent::User,
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::Validation(_))
        ));
    }

    #[test]
    fn test_update_status_stamps_updated() {
        let (_temp, recall) = store();
        let id = add(&recall, "Status target");
        recall
            .handoff_update_status(&id, HandoffStatus::InProgress)
            .unwrap();
        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.status, HandoffStatus::InProgress);
        assert_eq!(handoff.updated, Recall::today());
    }

    #[test]
    fn test_checkpoint_stamps_last_session() {
        let (_temp, recall) = store();
        let id = add(&recall, "Checkpoint target");
        recall
            .handoff_update_checkpoint(&id, "Halfway through the migration")
            .unwrap();
        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.checkpoint, "Halfway through the migration");
        assert_eq!(handoff.last_session, Some(Recall::today()));
    }

    #[test]
    fn test_auto_complete_on_final_success() {
        let (_temp, recall) = store();
        let id = add(&recall, "Auto complete target");
        recall
            .handoff_add_tried(&id, TriedOutcome::Success, "Final: shipped v1")
            .unwrap();
        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.status, HandoffStatus::Completed);
        assert_eq!(handoff.phase, Phase::Review);
    }

    #[test]
    fn test_no_auto_complete_on_fail_outcome() {
        let (_temp, recall) = store();
        let id = add(&recall, "Not done yet");
        recall
            .handoff_add_tried(&id, TriedOutcome::Fail, "Done button still broken")
            .unwrap();
        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.status, HandoffStatus::NotStarted);
    }

    #[test]
    fn test_auto_phase_bump_on_keyword() {
        let (_temp, recall) = store();
        let id = add(&recall, "Phase bump target");
        recall
            .handoff_add_tried(&id, TriedOutcome::Success, "Implement websocket reconnect")
            .unwrap();
        let handoff = recall.handoff_get(&id).unwrap().unwrap();
        assert_eq!(handoff.phase, Phase::Implementing);
    }

    #[test]
    fn test_auto_phase_bump_on_tenth_success() {
        let (_temp, recall) = store();
        let id = add(&recall, "Slow grind");
        for i in 0..9 {
            recall
                .handoff_add_tried(&id, TriedOutcome::Success, &format!("Probed option {i}"))
                .unwrap();
        }
        assert_eq!(
            recall.handoff_get(&id).unwrap().unwrap().phase,
            Phase::Research
        );
        recall
            .handoff_add_tried(&id, TriedOutcome::Success, "Probed option nine")
            .unwrap();
        assert_eq!(
            recall.handoff_get(&id).unwrap().unwrap().phase,
            Phase::Implementing
        );
    }

    #[test]
    fn test_auto_phase_never_regresses_review() {
        let (_temp, recall) = store();
        let id = add(&recall, "Review stays review");
        recall.handoff_update_phase(&id, Phase::Review).unwrap();
        recall
            .handoff_add_tried(&id, TriedOutcome::Success, "Fix typo in comment")
            .unwrap();
        assert_eq!(recall.handoff_get(&id).unwrap().unwrap().phase, Phase::Review);
    }

    #[test]
    fn test_complete_returns_extraction_prompt() {
        let (_temp, recall) = store();
        let id = add(&recall, "Completable work");
        recall
            .handoff_add_tried(&id, TriedOutcome::Fail, "Tried the naive path")
            .unwrap();

        let result = recall.handoff_complete(&id).unwrap();
        assert_eq!(result.handoff.status, HandoffStatus::Completed);
        assert!(result.extraction_prompt.contains("Completable work"));
        assert!(result.extraction_prompt.contains("[fail] Tried the naive path"));
    }

    #[test]
    fn test_archive_moves_record() {
        let (_temp, recall) = store();
        let id = add(&recall, "Archivable work");
        recall.handoff_archive(&id).unwrap();

        assert!(recall.handoff_get(&id).unwrap().is_none());
        let archive_content = fs::read_to_string(recall.handoffs_archive()).unwrap();
        assert!(archive_content.contains(&id));
        assert!(archive_content.contains("Archivable work"));
    }

    #[test]
    fn test_delete_is_permanent() {
        let (_temp, recall) = store();
        let id = add(&recall, "Deletable work");
        recall.handoff_delete(&id).unwrap();
        assert!(recall.handoff_get(&id).unwrap().is_none());
        assert!(!recall.handoffs_archive().exists());

        let err = recall.handoff_delete(&id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::NotFound(_))
        ));
    }

    #[test]
    fn test_stale_archival_prefixes_note() {
        let (_temp, recall) = store();
        let id = add(&recall, "Stale work");
        recall.handoff_update_desc(&id, "original description").unwrap();
        recall
            .set_handoff_updated(&id, Recall::today() - Duration::days(30))
            .unwrap();

        let policy = HandoffPolicy::default();
        let archived = recall.archive_stale_handoffs(&policy).unwrap();
        assert_eq!(archived, vec![id.clone()]);

        let archive_content = fs::read_to_string(recall.handoffs_archive()).unwrap();
        assert!(archive_content
            .contains("[Auto-archived: stale after 14 days] original description"));
        assert!(recall.handoff_get(&id).unwrap().is_none());
    }

    #[test]
    fn test_completed_archival_by_age() {
        let (_temp, recall) = store();
        let id = add(&recall, "Old completed work");
        recall
            .handoff_update_status(&id, HandoffStatus::Completed)
            .unwrap();
        recall
            .set_handoff_updated(&id, Recall::today() - Duration::days(45))
            .unwrap();

        let archived = recall
            .archive_old_completed_handoffs(&HandoffPolicy::default())
            .unwrap();
        assert_eq!(archived, vec![id]);
    }

    #[test]
    fn test_list_completed_hybrid_visibility() {
        let (_temp, recall) = store();
        let policy = HandoffPolicy {
            max_completed: 1,
            max_age_days: 7,
            ..Default::default()
        };

        let recent = add(&recall, "Recently completed");
        let older = add(&recall, "Older but in top N");
        let ancient = add(&recall, "Ancient completion");
        for id in [&recent, &older, &ancient] {
            recall
                .handoff_update_status(id, HandoffStatus::Completed)
                .unwrap();
        }
        recall
            .set_handoff_updated(&older, Recall::today() - Duration::days(10))
            .unwrap();
        recall
            .set_handoff_updated(&ancient, Recall::today() - Duration::days(20))
            .unwrap();

        let visible = recall.handoff_list_completed(&policy).unwrap();
        let ids: Vec<&str> = visible.iter().map(|h| h.id.as_str()).collect();
        // recent: top-1 AND young; older: outside top-1, too old -> hidden;
        // ancient: same -> hidden.
        assert_eq!(ids, vec![recent.as_str()]);
    }

    #[test]
    fn test_legacy_id_consults_archive() {
        let (_temp, recall) = store();
        let id = add(&recall, "Will be archived");
        // Rewrite the file with a legacy id to simulate an old store.
        let file_path = recall.handoffs_file();
        let content = fs::read_to_string(&file_path)
            .unwrap()
            .replace(&id, "A007");
        fs::write(&file_path, content).unwrap();

        recall.handoff_archive("A007").unwrap();
        assert_eq!(recall.next_legacy_handoff_id().unwrap(), "A008");
    }
}
