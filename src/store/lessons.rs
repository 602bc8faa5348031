//! Lesson store operations.
//!
//! Lessons live in two markdown files: one per project under the project
//! data directory, one per user under the lessons base. Ids are dense per
//! scope (`L###` / `S###`) and allocated by scanning the active file.
//! All mutations follow the lock / read / modify / rewrite transaction.

use anyhow::{Context, Result};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::models::constants::{
    DUPLICATE_SUBSTRING_MIN_LEN, MAX_USES, SYSTEM_PROMOTION_THRESHOLD, VELOCITY_DECAY_FACTOR,
    VELOCITY_EPSILON,
};
use crate::models::{
    CitationResult, DecayResult, InjectionResult, Lesson, LessonCategory, LessonLevel,
    LessonSource, RecallError,
};
use crate::parser::{format_lesson, parse_lessons};

use super::{LessonOps, Recall};

impl LessonOps for Recall {
    fn add_lesson(
        &self,
        level: LessonLevel,
        category: LessonCategory,
        title: &str,
        content: &str,
        source: LessonSource,
        force: bool,
        promotable: bool,
    ) -> Result<String> {
        let file_path = self.lessons_file(level);
        self.init_lessons_file(level)?;

        let lesson_id;
        {
            let _lock = self.lock_file(&file_path)?;

            if !force {
                if let Some(existing) = self.check_duplicate(title, &file_path, level)? {
                    return Err(RecallError::Duplicate(existing).into());
                }
            }

            lesson_id = self.next_lesson_id(&file_path, level)?;

            let today = Self::today();
            let lesson = Lesson {
                id: lesson_id.clone(),
                title: title.to_string(),
                content: content.to_string(),
                uses: 1,
                velocity: 0.0,
                learned: today,
                last_used: today,
                category,
                source,
                level,
                promotable,
            };

            let mut file = OpenOptions::new()
                .append(true)
                .open(&file_path)
                .with_context(|| format!("Failed to open: {}", file_path.display()))?;
            file.write_all(format!("\n{}", format_lesson(&lesson)).as_bytes())
                .with_context(|| format!("Failed to append: {}", file_path.display()))?;
        }

        self.logger().lesson_added(
            &lesson_id,
            &level.to_string(),
            &category.to_string(),
            &source.to_string(),
            title.chars().count(),
            content.chars().count(),
        );

        Ok(lesson_id)
    }

    fn add_ai_lesson(
        &self,
        level: LessonLevel,
        category: LessonCategory,
        title: &str,
        content: &str,
        promotable: bool,
    ) -> Result<String> {
        self.add_lesson(
            level,
            category,
            title,
            content,
            LessonSource::Ai,
            false,
            promotable,
        )
    }

    fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>> {
        let level = LessonLevel::from_id(lesson_id);
        let file_path = self.lessons_file(level);
        if !file_path.exists() {
            return Ok(None);
        }
        let lessons = self.read_lessons(&file_path, level)?;
        Ok(lessons.into_iter().find(|l| l.id == lesson_id))
    }

    fn cite_lesson(&self, lesson_id: &str) -> Result<CitationResult> {
        let level = LessonLevel::from_id(lesson_id);
        let file_path = self.lessons_file(level);
        if !file_path.exists() {
            return Err(RecallError::not_found("Lesson", lesson_id).into());
        }

        let uses_before;
        let velocity_before;
        let new_uses;
        let new_velocity;
        let promotable;
        {
            let _lock = self.lock_file(&file_path)?;
            let mut lessons = self.read_lessons(&file_path, level)?;

            let target = lessons
                .iter_mut()
                .find(|l| l.id == lesson_id)
                .ok_or_else(|| RecallError::not_found("Lesson", lesson_id))?;

            uses_before = target.uses;
            velocity_before = target.velocity;

            target.uses = (target.uses + 1).min(MAX_USES);
            target.velocity += 1.0;
            target.last_used = Self::today();

            new_uses = target.uses;
            new_velocity = target.velocity;
            promotable = target.promotable;

            self.write_lessons_file(&file_path, &lessons, level)?;
        }

        let promotion_ready = lesson_id.starts_with('L')
            && new_uses >= SYSTEM_PROMOTION_THRESHOLD
            && promotable;

        self.logger().citation(
            lesson_id,
            uses_before,
            new_uses,
            velocity_before,
            new_velocity,
            promotion_ready,
        );

        let message = if promotion_ready {
            format!("PROMOTION_READY:{lesson_id}:{new_uses}")
        } else {
            "OK".to_string()
        };

        Ok(CitationResult {
            lesson_id: lesson_id.to_string(),
            uses: new_uses,
            velocity: new_velocity,
            promotion_ready,
            message,
        })
    }

    fn edit_lesson(&self, lesson_id: &str, new_content: &str) -> Result<()> {
        let level = LessonLevel::from_id(lesson_id);
        let file_path = self.lessons_file(level);
        if !file_path.exists() {
            return Err(RecallError::not_found("Lesson", lesson_id).into());
        }

        let _lock = self.lock_file(&file_path)?;
        let mut lessons = self.read_lessons(&file_path, level)?;

        let target = lessons
            .iter_mut()
            .find(|l| l.id == lesson_id)
            .ok_or_else(|| RecallError::not_found("Lesson", lesson_id))?;
        target.content = new_content.to_string();

        self.write_lessons_file(&file_path, &lessons, level)?;
        self.logger()
            .mutation("edit", lesson_id, json!({"content_length": new_content.len()}));
        Ok(())
    }

    fn delete_lesson(&self, lesson_id: &str) -> Result<()> {
        let level = LessonLevel::from_id(lesson_id);
        let file_path = self.lessons_file(level);
        if !file_path.exists() {
            return Err(RecallError::not_found("Lesson", lesson_id).into());
        }

        let _lock = self.lock_file(&file_path)?;
        let mut lessons = self.read_lessons(&file_path, level)?;

        let before = lessons.len();
        lessons.retain(|l| l.id != lesson_id);
        if lessons.len() == before {
            return Err(RecallError::not_found("Lesson", lesson_id).into());
        }

        self.write_lessons_file(&file_path, &lessons, level)?;
        self.logger().mutation("delete", lesson_id, json!({}));
        Ok(())
    }

    /// Promotion runs as two sequential lock phases to avoid holding nested
    /// locks: first the system file gains the copy, then the project file
    /// loses the original. An interruption between the phases leaves the
    /// lesson present in both scopes; the system copy is authoritative and
    /// the project copy can be deleted by hand.
    fn promote_lesson(&self, lesson_id: &str) -> Result<String> {
        if !lesson_id.starts_with('L') {
            return Err(
                RecallError::Validation("Can only promote project lessons (L###)".into()).into(),
            );
        }

        let lesson = self
            .get_lesson(lesson_id)?
            .ok_or_else(|| RecallError::not_found("Lesson", lesson_id))?;

        self.init_lessons_file(LessonLevel::System)?;

        let system_file = self.system_lessons_file();
        let new_id;
        {
            let _lock = self.lock_file(&system_file)?;
            new_id = self.next_lesson_id(&system_file, LessonLevel::System)?;
            let mut system_lessons = self.read_lessons(&system_file, LessonLevel::System)?;
            system_lessons.push(Lesson {
                id: new_id.clone(),
                level: LessonLevel::System,
                promotable: true,
                ..lesson
            });
            self.write_lessons_file(&system_file, &system_lessons, LessonLevel::System)?;
        }

        let project_file = self.project_lessons_file();
        {
            let _lock = self.lock_file(&project_file)?;
            let mut project_lessons = self.read_lessons(&project_file, LessonLevel::Project)?;
            project_lessons.retain(|l| l.id != lesson_id);
            self.write_lessons_file(&project_file, &project_lessons, LessonLevel::Project)?;
        }

        self.logger()
            .mutation("promote", lesson_id, json!({"new_id": new_id}));

        Ok(new_id)
    }

    fn list_lessons(
        &self,
        scope: Option<LessonLevel>,
        search: Option<&str>,
        category: Option<LessonCategory>,
        stale_only: bool,
    ) -> Result<Vec<Lesson>> {
        let mut lessons = Vec::new();

        let include = |level: LessonLevel| scope.is_none() || scope == Some(level);

        if include(LessonLevel::Project) {
            let path = self.project_lessons_file();
            if path.exists() {
                lessons.extend(self.read_lessons(&path, LessonLevel::Project)?);
            }
        }
        if include(LessonLevel::System) {
            let path = self.system_lessons_file();
            if path.exists() {
                lessons.extend(self.read_lessons(&path, LessonLevel::System)?);
            }
        }

        if let Some(term) = search {
            let term = term.to_lowercase();
            lessons.retain(|l| {
                l.id.to_lowercase().contains(&term)
                    || l.title.to_lowercase().contains(&term)
                    || l.content.to_lowercase().contains(&term)
            });
        }

        if let Some(cat) = category {
            lessons.retain(|l| l.category == cat);
        }

        if stale_only {
            lessons.retain(|l| l.is_stale());
        }

        Ok(lessons)
    }

    fn inject_context(&self, top_n: usize) -> Result<InjectionResult> {
        let mut all_lessons = self.list_lessons(None, None, None, false)?;
        if all_lessons.is_empty() {
            return Ok(InjectionResult::default());
        }

        all_lessons.sort_by(|a, b| b.uses.cmp(&a.uses));
        let top_lessons: Vec<Lesson> = all_lessons.iter().take(top_n).cloned().collect();

        let system_count = all_lessons
            .iter()
            .filter(|l| l.level == LessonLevel::System)
            .count();
        let project_count = all_lessons.len() - system_count;
        let total_tokens: usize = all_lessons.iter().map(|l| l.tokens()).sum();

        let top_summary: Vec<(String, u32)> = top_lessons
            .iter()
            .map(|l| (l.id.clone(), l.uses))
            .collect();
        self.logger().session_start(
            &self.project_root().display().to_string(),
            &self.lessons_base().display().to_string(),
            all_lessons.len(),
            system_count,
            project_count,
            &top_summary,
            total_tokens,
        );

        Ok(InjectionResult {
            total_count: all_lessons.len(),
            system_count,
            project_count,
            top_lessons,
            all_lessons,
        })
    }

    fn inject_lessons(&self, limit: usize) -> Result<String> {
        let result = self.inject_context(limit)?;
        if result.all_lessons.is_empty() {
            return Ok(String::new());
        }

        let total_tokens: usize = result.all_lessons.iter().map(|l| l.tokens()).sum();

        let mut lines = Vec::new();
        lines.push(format!(
            "LESSONS ({}S, {}L | ~{} tokens)",
            result.system_count, result.project_count, total_tokens
        ));

        if total_tokens > 2000 {
            lines.push(
                "  ⚠️ CONTEXT HEAVY - Consider completing handoffs, archiving stale lessons"
                    .to_string(),
            );
        }

        for lesson in &result.top_lessons {
            let preview: String = if lesson.content.chars().count() > 60 {
                format!(
                    "{}...",
                    lesson.content.chars().take(60).collect::<String>()
                )
            } else {
                lesson.content.clone()
            };
            lines.push(format!(
                "  [{}] {} {} - {}",
                lesson.id,
                lesson.rating().format(),
                lesson.title,
                preview
            ));
        }

        let other: Vec<String> = result.all_lessons[result.top_lessons.len().min(result.all_lessons.len())..]
            .iter()
            .map(|l| format!("[{}] {}", l.id, l.title))
            .collect();
        if !other.is_empty() {
            lines.push(format!("  {}", other.join(" | ")));
        }

        lines.push("Cite [ID] when applying. LESSON: to add.".to_string());

        let excluded = result.all_lessons.len() - result.top_lessons.len();
        let included_ids: Vec<String> =
            result.top_lessons.iter().map(|l| l.id.clone()).collect();
        self.logger().injection_generated(
            total_tokens,
            result.top_lessons.len(),
            excluded,
            &included_ids,
        );

        Ok(lines.join("\n"))
    }

    fn decay_lessons(&self, stale_threshold_days: i64) -> Result<DecayResult> {
        let recent_sessions = self.count_recent_sessions()?;

        if recent_sessions == 0 && self.decay_state_file().exists() {
            self.update_decay_timestamp()?;
            self.logger().decay_result(0, 0, 0, true);
            return Ok(DecayResult {
                decayed_uses: 0,
                decayed_velocity: 0,
                sessions_since_last: 0,
                skipped: true,
                message: "No sessions since last decay - skipping (vacation mode)".to_string(),
            });
        }

        let mut decayed_uses = 0;
        let mut decayed_velocity = 0;
        let today = Self::today();

        for level in [LessonLevel::Project, LessonLevel::System] {
            let file_path = self.lessons_file(level);
            if !file_path.exists() {
                continue;
            }

            let _lock = self.lock_file(&file_path)?;
            let mut lessons = self.read_lessons(&file_path, level)?;

            for lesson in &mut lessons {
                if lesson.velocity > VELOCITY_EPSILON {
                    let old = lesson.velocity;
                    lesson.velocity = round2(lesson.velocity * VELOCITY_DECAY_FACTOR);
                    if lesson.velocity < VELOCITY_EPSILON {
                        lesson.velocity = 0.0;
                    }
                    if lesson.velocity != old {
                        decayed_velocity += 1;
                    }
                }

                let days_since = (today - lesson.last_used).num_days();
                if days_since > stale_threshold_days && lesson.uses > 1 {
                    lesson.uses -= 1;
                    decayed_uses += 1;
                }
            }

            self.write_lessons_file(&file_path, &lessons, level)?;
        }

        self.update_decay_timestamp()?;
        self.logger()
            .decay_result(decayed_uses, decayed_velocity, recent_sessions, false);

        Ok(DecayResult {
            decayed_uses,
            decayed_velocity,
            sessions_since_last: recent_sessions,
            skipped: false,
            message: format!(
                "Decayed: {decayed_uses} uses, {decayed_velocity} velocities ({recent_sessions} sessions since last run)"
            ),
        })
    }
}

impl Recall {
    /// Create a lessons file with its instructional header when absent.
    pub fn init_lessons_file(&self, level: LessonLevel) -> Result<()> {
        let file_path = self.lessons_file(level);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create: {}", parent.display()))?;
        }
        if file_path.exists() {
            return Ok(());
        }
        fs::write(&file_path, lessons_header(level))
            .with_context(|| format!("Failed to create: {}", file_path.display()))?;
        Ok(())
    }

    /// Touch a session marker so the next decay pass sees activity.
    pub fn record_session_marker(&self) -> Result<()> {
        let dir = self.session_state_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create: {}", dir.display()))?;
        let marker = dir.join(self.logger().session_id());
        fs::write(&marker, b"")
            .with_context(|| format!("Failed to create: {}", marker.display()))?;
        Ok(())
    }

    fn read_lessons(&self, file_path: &Path, level: LessonLevel) -> Result<Vec<Lesson>> {
        let start = std::time::Instant::now();
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read: {}", file_path.display()))?;
        let lessons = parse_lessons(&content, level);
        self.logger()
            .file_io("read", file_path, start.elapsed().as_secs_f64() * 1000.0);
        Ok(lessons)
    }

    fn write_lessons_file(
        &self,
        file_path: &Path,
        lessons: &[Lesson],
        level: LessonLevel,
    ) -> Result<()> {
        let start = std::time::Instant::now();

        // Preserve whatever header precedes the first record.
        let header = match fs::read_to_string(file_path) {
            Ok(existing) => {
                let mut header_lines = Vec::new();
                for line in existing.lines() {
                    if line.starts_with("### [") {
                        break;
                    }
                    header_lines.push(line);
                }
                let mut header = header_lines.join("\n").trim_end().to_string();
                header.push('\n');
                header
            }
            Err(_) => lessons_header(level),
        };

        let mut out = header;
        for lesson in lessons {
            out.push('\n');
            out.push_str(&format_lesson(lesson));
        }

        fs::write(file_path, out)
            .with_context(|| format!("Failed to write: {}", file_path.display()))?;
        self.logger()
            .file_io("write", file_path, start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Next dense id for a scope. Only the active file is scanned; lessons
    /// have no archive to consult.
    fn next_lesson_id(&self, file_path: &Path, level: LessonLevel) -> Result<String> {
        let prefix = level.id_prefix();
        let mut max_id = 0u32;

        if file_path.exists() {
            for lesson in self.read_lessons(file_path, level)? {
                if let Some(num) = lesson
                    .id
                    .strip_prefix(prefix)
                    .and_then(|n| n.parse::<u32>().ok())
                {
                    max_id = max_id.max(num);
                }
            }
        }

        Ok(format!("{prefix}{:03}", max_id + 1))
    }

    fn check_duplicate(
        &self,
        title: &str,
        file_path: &Path,
        level: LessonLevel,
    ) -> Result<Option<String>> {
        if !file_path.exists() {
            return Ok(None);
        }

        let normalized = normalize_title(title);
        for lesson in self.read_lessons(file_path, level)? {
            let existing = normalize_title(&lesson.title);

            if normalized == existing {
                return Ok(Some(lesson.title));
            }
            if normalized.len() > DUPLICATE_SUBSTRING_MIN_LEN && existing.contains(&normalized) {
                return Ok(Some(lesson.title));
            }
            if existing.len() > DUPLICATE_SUBSTRING_MIN_LEN && normalized.contains(&existing) {
                return Ok(Some(lesson.title));
            }
        }

        Ok(None)
    }

    /// Sessions started since the last decay, judged by marker mtimes.
    fn count_recent_sessions(&self) -> Result<usize> {
        let session_dir = self.session_state_dir();
        if !session_dir.exists() {
            return Ok(0);
        }

        let entries: Vec<_> = fs::read_dir(&session_dir)
            .with_context(|| format!("Failed to read: {}", session_dir.display()))?
            .filter_map(|e| e.ok())
            .collect();

        let decay_file = self.decay_state_file();
        let Ok(decay_meta) = fs::metadata(&decay_file) else {
            // First run: every session counts.
            return Ok(entries.len());
        };
        let decay_mtime = decay_meta.modified()?;

        let count = entries
            .iter()
            .filter(|e| {
                e.metadata()
                    .and_then(|m| m.modified())
                    .map(|mtime| mtime > decay_mtime)
                    .unwrap_or(false)
            })
            .count();
        Ok(count)
    }

    /// Test support: rewrite a lesson's last-used date.
    pub fn set_lesson_last_used(&self, lesson_id: &str, last_used: chrono::NaiveDate) -> Result<()> {
        self.rewrite_lesson(lesson_id, |l| l.last_used = last_used)
    }

    /// Test support: rewrite a lesson's velocity.
    pub fn set_lesson_velocity(&self, lesson_id: &str, velocity: f64) -> Result<()> {
        self.rewrite_lesson(lesson_id, |l| l.velocity = velocity)
    }

    /// Test support: rewrite a lesson's uses count.
    pub fn set_lesson_uses(&self, lesson_id: &str, uses: u32) -> Result<()> {
        self.rewrite_lesson(lesson_id, |l| l.uses = uses)
    }

    fn rewrite_lesson(&self, lesson_id: &str, f: impl FnOnce(&mut Lesson)) -> Result<()> {
        let level = LessonLevel::from_id(lesson_id);
        let file_path = self.lessons_file(level);
        if !file_path.exists() {
            return Ok(());
        }
        let _lock = self.lock_file(&file_path)?;
        let mut lessons = self.read_lessons(&file_path, level)?;
        if let Some(lesson) = lessons.iter_mut().find(|l| l.id == lesson_id) {
            f(lesson);
        }
        self.write_lessons_file(&file_path, &lessons, level)
    }

    fn update_decay_timestamp(&self) -> Result<()> {
        let decay_file = self.decay_state_file();
        if let Some(parent) = decay_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create: {}", parent.display()))?;
        }
        fs::write(&decay_file, Self::today().format("%Y-%m-%d").to_string())
            .with_context(|| format!("Failed to write: {}", decay_file.display()))?;
        Ok(())
    }
}

fn lessons_header(level: LessonLevel) -> String {
    let prefix = level.id_prefix();
    let level_cap = level.display_name();
    format!(
        "# LESSONS.md - {level_cap} Level\n\n\
         > **Lessons System**: Cite lessons with [{prefix}###] when applying them.\n\
         > Stars accumulate with each use. At 50 uses, project lessons promote to system.\n\
         >\n\
         > **Add lessons**: `LESSON: [category:] title - content`\n\
         > **Categories**: pattern, correction, decision, gotcha, preference\n\n\
         ## Active Lessons\n"
    )
}

/// Lowercase, strip ASCII punctuation, collapse whitespace.
fn normalize_title(title: &str) -> String {
    let lowered: String = title
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
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

    #[test]
    fn test_add_allocates_dense_ids() {
        let (_temp, recall) = store();
        let first = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Use builders for config structs",
                "Optional fields stay optional.",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        let second = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Gotcha,
                "Serde defaults silently mask typos",
                "Unknown keys vanish with default attrs.",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        assert_eq!(first, "L001");
        assert_eq!(second, "L002");
    }

    #[test]
    fn test_duplicate_detection() {
        let (_temp, recall) = store();
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Always run clippy before pushing",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();

        // Exact match, punctuation and case differences ignored.
        let err = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "always run CLIPPY before pushing!",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::Duplicate(_))
        ));

        // Substring containment with the length gate.
        let err = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "run clippy before",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::Duplicate(_))
        ));

        // Force bypasses the check.
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Always run clippy before pushing",
                "content",
                LessonSource::Human,
                true,
                true,
            )
            .unwrap();
    }

    #[test]
    fn test_short_titles_require_exact_match() {
        let (_temp, recall) = store();
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "authorization flows",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();

        // "auth" is under the substring gate, so it does not collide.
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "auth",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
    }

    #[test]
    fn test_cite_saturates_and_flags_promotion() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Citable lesson",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();

        let mut last = None;
        for _ in 0..49 {
            last = Some(recall.cite_lesson(&id).unwrap());
        }
        let result = last.unwrap();
        assert_eq!(result.uses, 50);
        assert_eq!(result.velocity, 49.0);
        assert!(result.promotion_ready);
        assert_eq!(result.message, format!("PROMOTION_READY:{id}:50"));
    }

    #[test]
    fn test_cite_respects_no_promote() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Preference,
                "Pinned preference lesson",
                "content",
                LessonSource::Human,
                false,
                false,
            )
            .unwrap();
        for _ in 0..60 {
            let result = recall.cite_lesson(&id).unwrap();
            assert!(!result.promotion_ready);
        }
    }

    #[test]
    fn test_cite_unknown_id() {
        let (_temp, recall) = store();
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Some lesson",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        let err = recall.cite_lesson("L099").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::NotFound(_))
        ));
    }

    #[test]
    fn test_promote_moves_lesson_with_metrics() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Promotion candidate",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        for _ in 0..10 {
            recall.cite_lesson(&id).unwrap();
        }

        let new_id = recall.promote_lesson(&id).unwrap();
        assert_eq!(new_id, "S001");

        assert!(recall.get_lesson(&id).unwrap().is_none());
        let promoted = recall.get_lesson(&new_id).unwrap().unwrap();
        assert_eq!(promoted.uses, 11);
        assert_eq!(promoted.velocity, 10.0);
        assert_eq!(promoted.level, LessonLevel::System);

        // A second promote of the now-missing project id is rejected.
        let err = recall.promote_lesson(&id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::NotFound(_))
        ));
    }

    #[test]
    fn test_promote_rejects_system_ids() {
        let (_temp, recall) = store();
        let err = recall.promote_lesson("S001").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecallError>(),
            Some(RecallError::Validation(_))
        ));
    }

    #[test]
    fn test_list_filters() {
        let (_temp, recall) = store();
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Project side entry",
                "searchable needle",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        recall
            .add_lesson(
                LessonLevel::System,
                LessonCategory::Gotcha,
                "System side entry",
                "other content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();

        assert_eq!(recall.list_lessons(None, None, None, false).unwrap().len(), 2);
        assert_eq!(
            recall
                .list_lessons(Some(LessonLevel::System), None, None, false)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            recall
                .list_lessons(None, Some("needle"), None, false)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            recall
                .list_lessons(None, None, Some(LessonCategory::Gotcha), false)
                .unwrap()
                .len(),
            1
        );
        assert!(recall
            .list_lessons(None, None, None, true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_inject_format() {
        let (_temp, recall) = store();
        recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Top lesson",
                "a".repeat(80).as_str(),
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        recall
            .add_lesson(
                LessonLevel::System,
                LessonCategory::Decision,
                "Runner up",
                "short",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();

        let output = recall.inject_lessons(1).unwrap();
        assert!(output.starts_with("LESSONS (1S, 1L |"));
        // 60-char preview with ellipsis for the long content.
        assert!(output.contains("..."));
        // The runner-up lands on the compact line.
        assert!(output.contains("[S001] Runner up"));
        assert!(output.ends_with("Cite [ID] when applying. LESSON: to add."));
    }

    #[test]
    fn test_inject_empty_store() {
        let (_temp, recall) = store();
        assert_eq!(recall.inject_lessons(5).unwrap(), "");
    }

    #[test]
    fn test_decay_halves_velocity_and_decrements_stale_uses() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Decaying lesson",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        for _ in 0..4 {
            recall.cite_lesson(&id).unwrap();
        }

        // Pretend the lesson went uncited for two months.
        recall.set_lesson_last_used(&id, today_minus(65)).unwrap();
        // A session happened, so decay must not enter vacation mode.
        fs::create_dir_all(recall.session_state_dir()).unwrap();
        fs::write(recall.session_state_dir().join("abc123"), b"").unwrap();

        let result = recall.decay_lessons(30).unwrap();
        assert!(!result.skipped);
        assert_eq!(result.decayed_velocity, 1);
        assert_eq!(result.decayed_uses, 1);

        let lesson = recall.get_lesson(&id).unwrap().unwrap();
        assert_eq!(lesson.velocity, 2.0);
        assert_eq!(lesson.uses, 4);
    }

    #[test]
    fn test_decay_epsilon_floor() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Tiny velocity",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        recall.set_lesson_velocity(&id, 0.02).unwrap();
        fs::create_dir_all(recall.session_state_dir()).unwrap();
        fs::write(recall.session_state_dir().join("s1"), b"").unwrap();

        recall.decay_lessons(30).unwrap();
        let lesson = recall.get_lesson(&id).unwrap().unwrap();
        assert_eq!(lesson.velocity, 0.0);
    }

    #[test]
    fn test_vacation_mode_skips_second_pass() {
        let (_temp, recall) = store();
        let id = recall
            .add_lesson(
                LessonLevel::Project,
                LessonCategory::Pattern,
                "Vacation lesson",
                "content",
                LessonSource::Human,
                false,
                true,
            )
            .unwrap();
        for _ in 0..3 {
            recall.cite_lesson(&id).unwrap();
        }

        fs::create_dir_all(recall.session_state_dir()).unwrap();
        fs::write(recall.session_state_dir().join("s1"), b"").unwrap();

        let first = recall.decay_lessons(30).unwrap();
        assert!(!first.skipped);
        let velocity_after_first = recall.get_lesson(&id).unwrap().unwrap().velocity;

        // No new session markers: the second run is a no-op.
        let second = recall.decay_lessons(30).unwrap();
        assert!(second.skipped);
        assert_eq!(second.decayed_uses, 0);
        assert_eq!(second.decayed_velocity, 0);
        assert_eq!(
            recall.get_lesson(&id).unwrap().unwrap().velocity,
            velocity_after_first
        );
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Always, run CLIPPY!  before   pushing. "),
            "always run clippy before pushing"
        );
    }

    fn today_minus(days: i64) -> chrono::NaiveDate {
        Recall::today() - chrono::Duration::days(days)
    }
}
