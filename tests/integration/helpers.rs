//! Shared test helpers for store scenario tests.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use recall::logging::EventLogger;
use recall::store::Recall;

/// A store rooted in a fresh temp directory, logging disabled.
pub fn test_store() -> (TempDir, Recall) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let base = temp.path().join("base");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("Failed to create project dir");
    let store = Recall::with_logger(base, project, EventLogger::disabled());
    (temp, store)
}

/// Touch a session marker so decay does not enter vacation mode.
pub fn touch_session_marker(store: &Recall, name: &str) {
    let dir = store.session_state_dir();
    fs::create_dir_all(&dir).expect("Failed to create session state dir");
    fs::write(dir.join(name), b"").expect("Failed to touch session marker");
}

/// Initialize a git repository with one commit at `repo_root`.
pub fn init_git_repo(repo_root: &Path) {
    run_git(repo_root, &["init"]);
    run_git(repo_root, &["config", "user.email", "test@test.com"]);
    run_git(repo_root, &["config", "user.name", "Test User"]);
    fs::write(repo_root.join("README.md"), "# Test Repository\n")
        .expect("Failed to write README.md");
    run_git(repo_root, &["add", "."]);
    run_git(repo_root, &["commit", "-m", "Initial commit"]);
}

pub fn git_head(repo_root: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .expect("Failed to read HEAD");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn run_git(repo_root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .unwrap_or_else(|_| panic!("Failed to run git {args:?}"));
    assert!(status.status.success(), "git {args:?} failed");
}
