//! Lightweight snapshots of the markdown stores for observers.
//!
//! Parses the same grammar as the store parsers but yields summary records
//! only. Tolerates both data-directory generations and both handoff
//! filename generations, since an observer may be pointed at a project
//! that has not migrated.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::fs::paths;
use crate::models::{HandoffStatus, LessonLevel, Phase};
use crate::parser::{parse_handoffs, parse_lessons};

/// Candidate data directory names, current name first.
const DATA_DIRS: [&str; 2] = [paths::RECALL_DIR, paths::LEGACY_DIR];

/// Candidate handoff file names, current name first.
const HANDOFF_FILES: [&str; 2] = [paths::HANDOFFS_FILE, paths::APPROACHES_FILE];

/// Summary of one lesson for dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSummary {
    pub id: String,
    pub title: String,
    pub uses: u32,
    pub velocity: f64,
    pub level: LessonLevel,
}

/// Summary of one handoff for dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffSummary {
    pub id: String,
    pub title: String,
    pub status: HandoffStatus,
    pub phase: Phase,
    pub updated: NaiveDate,
}

/// Decay marker state.
#[derive(Debug, Clone, Default)]
pub struct DecayInfo {
    pub exists: bool,
    /// Marker file content (the date of the last run).
    pub last_run: Option<String>,
    pub modified: Option<SystemTime>,
}

/// Read-only view over a (user, project) store pair.
pub struct StateReader {
    lessons_base: PathBuf,
    project_root: Option<PathBuf>,
}

impl StateReader {
    pub fn new(lessons_base: PathBuf, project_root: Option<PathBuf>) -> Self {
        Self {
            lessons_base,
            project_root,
        }
    }

    /// Resolve roots from the environment, like the store does.
    pub fn from_env() -> Self {
        Self::new(paths::lessons_base(), Some(paths::project_root()))
    }

    pub fn system_lessons_file(&self) -> PathBuf {
        self.lessons_base.join(paths::LESSONS_FILE)
    }

    /// First existing project lessons file across directory generations.
    pub fn project_lessons_file(&self) -> Option<PathBuf> {
        let root = self.project_root.as_ref()?;
        find_existing(root, &DATA_DIRS, &[paths::LESSONS_FILE])
    }

    /// First existing handoffs file across directory and filename
    /// generations.
    pub fn project_handoffs_file(&self) -> Option<PathBuf> {
        let root = self.project_root.as_ref()?;
        find_existing(root, &DATA_DIRS, &HANDOFF_FILES)
    }

    pub fn decay_state_file(&self) -> PathBuf {
        paths::decay_state_file(&self.lessons_base)
    }

    /// Lesson summaries for one scope.
    pub fn lessons(&self, level: LessonLevel) -> Vec<LessonSummary> {
        let path = match level {
            LessonLevel::System => Some(self.system_lessons_file()),
            LessonLevel::Project => self.project_lessons_file(),
        };
        let Some(path) = path.filter(|p| p.exists()) else {
            return Vec::new();
        };
        let Ok(content) = fs::read_to_string(&path) else {
            return Vec::new();
        };

        parse_lessons(&content, level)
            .into_iter()
            .map(|l| LessonSummary {
                id: l.id,
                title: l.title,
                uses: l.uses,
                velocity: l.velocity,
                level,
            })
            .collect()
    }

    /// (system, project) lesson counts.
    pub fn lesson_counts(&self) -> (usize, usize) {
        (
            self.lessons(LessonLevel::System).len(),
            self.lessons(LessonLevel::Project).len(),
        )
    }

    /// All handoff summaries in the active file.
    pub fn handoffs(&self) -> Vec<HandoffSummary> {
        let Some(path) = self.project_handoffs_file() else {
            return Vec::new();
        };
        let Ok(content) = fs::read_to_string(&path) else {
            return Vec::new();
        };

        parse_handoffs(&content)
            .into_iter()
            .map(|h| HandoffSummary {
                id: h.id,
                title: h.title,
                status: h.status,
                phase: h.phase,
                updated: h.updated,
            })
            .collect()
    }

    /// Non-completed handoff summaries.
    pub fn active_handoffs(&self) -> Vec<HandoffSummary> {
        self.handoffs()
            .into_iter()
            .filter(|h| h.status != HandoffStatus::Completed)
            .collect()
    }

    pub fn decay_info(&self) -> DecayInfo {
        let path = self.decay_state_file();
        let Ok(meta) = fs::metadata(&path) else {
            return DecayInfo::default();
        };
        DecayInfo {
            exists: true,
            last_run: fs::read_to_string(&path)
                .ok()
                .map(|s| s.trim().to_string()),
            modified: meta.modified().ok(),
        }
    }
}

fn find_existing(root: &Path, dirs: &[&str], files: &[&str]) -> Option<PathBuf> {
    for dir in dirs {
        for file in files {
            let candidate = root.join(dir).join(file);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}
