//! Dependency readiness and resume-time validation.
//!
//! `ready` applies the blocked_by rules; `resume` checks how far the
//! codebase has drifted from a handoff's captured context (git ref and
//! critical file existence) before an agent picks the work back up.

use anyhow::Result;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

use crate::models::{Handoff, HandoffStatus, RecallError, ResumeResult, ValidationReport};

use super::super::{HandoffOps, Recall};
use super::inject::is_handoff_ready;

/// How long the HEAD lookup may take before validation skips it.
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

impl Recall {
    pub(super) fn ready_impl(&self) -> Result<Vec<Handoff>> {
        let file_path = self.handoffs_file();
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let all_handoffs = self.handoff_list(None, true)?;
        let mut ready: Vec<Handoff> = all_handoffs
            .iter()
            .filter(|h| h.status != HandoffStatus::Completed)
            .filter(|h| is_handoff_ready(h, &all_handoffs))
            .cloned()
            .collect();

        // Active work first, then most recently touched.
        ready.sort_by(|a, b| {
            let a_priority = (a.status != HandoffStatus::InProgress) as u8;
            let b_priority = (b.status != HandoffStatus::InProgress) as u8;
            a_priority.cmp(&b_priority).then(b.updated.cmp(&a.updated))
        });

        Ok(ready)
    }

    pub(super) fn resume_impl(&self, handoff_id: &str) -> Result<ResumeResult> {
        let handoff = self
            .handoff_get(handoff_id)?
            .ok_or_else(|| RecallError::not_found("Handoff", handoff_id))?;

        // No captured context: nothing to validate against.
        let Some(context) = handoff.handoff.clone() else {
            return Ok(ResumeResult {
                handoff,
                validation: ValidationReport {
                    valid: true,
                    warnings: Vec::new(),
                    errors: Vec::new(),
                },
                context: None,
            });
        };

        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if !context.git_ref.is_empty() {
            if let Some(head) = self.current_git_head() {
                if head != context.git_ref {
                    let was: String = context.git_ref.chars().take(7).collect();
                    let now: String = head.chars().take(7).collect();
                    warnings.push(format!(
                        "Codebase has changed since handoff (was {was}, now {now})"
                    ));
                }
            }
        }

        for file_ref in &context.critical_files {
            let file_path = file_ref.split(':').next().unwrap_or(file_ref);
            if !self.project_root().join(file_path).exists() {
                errors.push(format!("File no longer exists: {file_path}"));
            }
        }

        let valid = errors.is_empty();
        Ok(ResumeResult {
            handoff,
            validation: ValidationReport {
                valid,
                warnings,
                errors,
            },
            context: Some(context),
        })
    }

    /// Current HEAD, or None when git is absent, fails, or times out.
    /// Validation skips silently in all of those cases.
    fn current_git_head(&self) -> Option<String> {
        let mut child = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(self.project_root())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        match child.wait_timeout(GIT_TIMEOUT).ok()? {
            Some(status) if status.success() => {
                let mut out = String::new();
                child.stdout.take()?.read_to_string(&mut out).ok()?;
                let head = out.trim().to_string();
                (!head.is_empty()).then_some(head)
            }
            Some(_) => None,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                None
            }
        }
    }
}
