//! Path resolution for the lesson and handoff stores.
//!
//! Two generations of on-disk naming are live at once: the per-project data
//! directory may be `.recall/` (current) or `.coding-agent-lessons/`
//! (legacy), and the handoff files may be `HANDOFFS*.md` (current) or
//! `APPROACHES*.md` (legacy). Readers accept both; writers prefer the
//! current names when creating.

use std::env;
use std::path::{Path, PathBuf};

/// Current per-project data directory name
pub const RECALL_DIR: &str = ".recall";

/// Legacy per-project data directory name
pub const LEGACY_DIR: &str = ".coding-agent-lessons";

/// Lessons file name (both scopes)
pub const LESSONS_FILE: &str = "LESSONS.md";

/// Current handoff file names
pub const HANDOFFS_FILE: &str = "HANDOFFS.md";
pub const HANDOFFS_ARCHIVE_FILE: &str = "HANDOFFS_ARCHIVE.md";

/// Legacy handoff file names
pub const APPROACHES_FILE: &str = "APPROACHES.md";
pub const APPROACHES_ARCHIVE_FILE: &str = "APPROACHES_ARCHIVE.md";

/// System lessons base directory.
///
/// Precedence: `RECALL_BASE` > `LESSONS_BASE` > `~/.config/coding-agent-lessons`.
pub fn lessons_base() -> PathBuf {
    if let Ok(base) = env::var("RECALL_BASE") {
        if !base.is_empty() {
            return PathBuf::from(base);
        }
    }
    if let Ok(base) = env::var("LESSONS_BASE") {
        if !base.is_empty() {
            return PathBuf::from(base);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coding-agent-lessons")
}

/// State directory holding the event log.
///
/// Precedence: `CLAUDE_RECALL_STATE` > `XDG_STATE_HOME/claude-recall` >
/// `~/.local/state/claude-recall`.
pub fn state_dir() -> PathBuf {
    if let Ok(state) = env::var("CLAUDE_RECALL_STATE") {
        if !state.is_empty() {
            return PathBuf::from(state);
        }
    }
    if let Ok(xdg) = env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("claude-recall");
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("state")
        .join("claude-recall")
}

/// Path of the event log file.
pub fn log_path() -> PathBuf {
    state_dir().join("debug.log")
}

/// Project root: `PROJECT_DIR`, else the nearest ancestor of the current
/// directory containing `.git`, else the current directory itself.
pub fn project_root() -> PathBuf {
    if let Ok(dir) = env::var("PROJECT_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut dir = cwd.as_path();
    loop {
        if dir.join(".git").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return cwd,
        }
    }
}

/// Per-project data directory, preferring `.recall/` over the legacy name.
/// Falls back to `.recall/` for projects with no data directory yet.
pub fn project_data_dir(project_root: &Path) -> PathBuf {
    let recall = project_root.join(RECALL_DIR);
    if recall.exists() {
        return recall;
    }
    let legacy = project_root.join(LEGACY_DIR);
    if legacy.exists() {
        return legacy;
    }
    recall
}

/// Project lessons file inside the resolved data directory.
pub fn project_lessons_file(project_root: &Path) -> PathBuf {
    project_data_dir(project_root).join(LESSONS_FILE)
}

/// Project handoffs file: existing current name wins, then existing legacy
/// name, then the current name in `.recall/` for new projects.
pub fn project_handoffs_file(project_root: &Path) -> PathBuf {
    resolve_handoff_file(project_root, HANDOFFS_FILE, APPROACHES_FILE)
}

/// Project handoffs archive, resolved the same way as the active file.
pub fn project_handoffs_archive(project_root: &Path) -> PathBuf {
    resolve_handoff_file(project_root, HANDOFFS_ARCHIVE_FILE, APPROACHES_ARCHIVE_FILE)
}

fn resolve_handoff_file(project_root: &Path, current: &str, legacy: &str) -> PathBuf {
    let data_dir = project_data_dir(project_root);
    let current_path = data_dir.join(current);
    if current_path.exists() {
        return current_path;
    }
    let legacy_path = data_dir.join(legacy);
    if legacy_path.exists() {
        return legacy_path;
    }
    project_root.join(RECALL_DIR).join(current)
}

/// Marker file whose mtime records the last decay run.
pub fn decay_state_file(lessons_base: &Path) -> PathBuf {
    lessons_base.join(".decay-last-run")
}

/// Directory of per-session marker files used for vacation-mode detection.
pub fn session_state_dir(lessons_base: &Path) -> PathBuf {
    lessons_base.join(".citation-state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_data_dir_prefers_recall() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join(RECALL_DIR)).unwrap();
        fs::create_dir(temp.path().join(LEGACY_DIR)).unwrap();
        assert_eq!(
            project_data_dir(temp.path()),
            temp.path().join(RECALL_DIR)
        );
    }

    #[test]
    fn test_data_dir_falls_back_to_legacy() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join(LEGACY_DIR)).unwrap();
        assert_eq!(
            project_data_dir(temp.path()),
            temp.path().join(LEGACY_DIR)
        );
    }

    #[test]
    fn test_data_dir_defaults_to_recall() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(
            project_data_dir(temp.path()),
            temp.path().join(RECALL_DIR)
        );
    }

    #[test]
    fn test_handoffs_file_prefers_existing_current_name() {
        let temp = tempfile::tempdir().unwrap();
        let data = temp.path().join(LEGACY_DIR);
        fs::create_dir(&data).unwrap();
        fs::write(data.join(APPROACHES_FILE), "").unwrap();
        // Legacy directory with legacy file: read/write goes there.
        assert_eq!(
            project_handoffs_file(temp.path()),
            data.join(APPROACHES_FILE)
        );

        // Once a current-name file exists in the same directory it wins.
        fs::write(data.join(HANDOFFS_FILE), "").unwrap();
        assert_eq!(
            project_handoffs_file(temp.path()),
            data.join(HANDOFFS_FILE)
        );
    }

    #[test]
    fn test_handoffs_file_default_for_new_project() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(
            project_handoffs_file(temp.path()),
            temp.path().join(RECALL_DIR).join(HANDOFFS_FILE)
        );
    }
}
