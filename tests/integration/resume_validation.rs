//! Resume-time validation against a real repository.

use std::fs;

use recall::logging::EventLogger;
use recall::models::{Agent, HandoffContext, Phase};
use recall::store::{HandoffOps, Recall};
use tempfile::TempDir;

use super::helpers::{git_head, init_git_repo, test_store};

/// A store whose project root is a git repository with one commit.
fn git_store() -> (TempDir, Recall) {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("base");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    init_git_repo(&project);
    let store = Recall::with_logger(base, project, EventLogger::disabled());
    (temp, store)
}

#[test]
fn resume_flags_drift_and_missing_files() {
    let (_temp, store) = git_store();
    fs::write(store.project_root().join("kept.rs"), "fn main() {}").unwrap();

    let id = store
        .handoff_add("Drifted work", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    store
        .handoff_update_context(
            &id,
            HandoffContext {
                summary: "captured mid-flight".to_string(),
                critical_files: vec!["kept.rs:42".to_string(), "gone.rs:7".to_string()],
                recent_changes: vec![],
                learnings: vec![],
                blockers: vec![],
                git_ref: "0000000deadbeef0000000deadbeef00000000aa".to_string(),
            },
        )
        .unwrap();

    let result = store.handoff_resume(&id).unwrap();

    // HEAD differs from the captured ref: one warning with abbreviated refs.
    assert_eq!(result.validation.warnings.len(), 1);
    assert!(result.validation.warnings[0].contains("was 0000000"));

    // Missing critical file: one error, and errors invalidate.
    assert_eq!(
        result.validation.errors,
        vec!["File no longer exists: gone.rs".to_string()]
    );
    assert!(!result.validation.valid);
}

#[test]
fn resume_clean_when_ref_matches_and_files_exist() {
    let (_temp, store) = git_store();
    fs::write(store.project_root().join("kept.rs"), "fn main() {}").unwrap();
    let head = git_head(store.project_root());

    let id = store
        .handoff_add("Stable work", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    store
        .handoff_update_context(
            &id,
            HandoffContext {
                summary: "captured at HEAD".to_string(),
                critical_files: vec!["kept.rs:1".to_string()],
                recent_changes: vec![],
                learnings: vec![],
                blockers: vec![],
                git_ref: head,
            },
        )
        .unwrap();

    let result = store.handoff_resume(&id).unwrap();
    assert!(result.validation.valid);
    assert!(result.validation.warnings.is_empty());
    assert!(result.validation.errors.is_empty());
}

#[test]
fn resume_without_git_skips_ref_check() {
    // Plain directory, no repository: the git comparison is skipped and
    // only file existence is validated.
    let (_temp, store) = test_store();
    let id = store
        .handoff_add("No repo here", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    store
        .handoff_update_context(
            &id,
            HandoffContext {
                summary: "context".to_string(),
                critical_files: vec![],
                recent_changes: vec![],
                learnings: vec![],
                blockers: vec![],
                git_ref: "abcdef1234567890".to_string(),
            },
        )
        .unwrap();

    let result = store.handoff_resume(&id).unwrap();
    assert!(result.validation.valid);
    assert!(result.validation.warnings.is_empty());
}
