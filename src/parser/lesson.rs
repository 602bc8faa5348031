//! Lesson block parsing and formatting.
//!
//! Stored form:
//!
//! ```text
//! ### [L001] [**|] Prefer guard clauses
//! - **Uses**: 3 | **Velocity**: 1.5 | **Learned**: 2025-01-10 | **Last**: 2025-02-01 | **Category**: pattern
//! > Early returns keep the happy path unindented.
//! ```
//!
//! The legacy grammar omits `Velocity` (defaults to 0) and `Source`
//! (defaults to human). AI-sourced lessons carry a robot marker in the
//! title, stripped on parse and re-applied on format.

use chrono::NaiveDate;
use regex::Regex;

use crate::models::lesson::ROBOT_EMOJI;
use crate::models::{Lesson, LessonLevel, LessonSource};

/// Parse every lesson block in a file's content.
pub fn parse_lessons(content: &str, level: LessonLevel) -> Vec<Lesson> {
    let lines: Vec<&str> = content.lines().collect();
    let mut lessons = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        if lines[idx].starts_with("### [") {
            match parse_lesson_block(&lines, idx, level) {
                Some((lesson, end_idx)) => {
                    lessons.push(lesson);
                    idx = end_idx;
                }
                None => idx += 1,
            }
        } else {
            idx += 1;
        }
    }

    lessons
}

/// Parse one lesson starting at `start_idx`. Returns the record and the
/// index just past it, or None when the block is malformed.
fn parse_lesson_block(
    lines: &[&str],
    start_idx: usize,
    level: LessonLevel,
) -> Option<(Lesson, usize)> {
    // Rating glyphs are display-only and recomputed; the bracket group is
    // optional so headers written without one still parse.
    let header_re =
        Regex::new(r"^###\s*\[([LS]\d{3})\]\s*(?:\[([*+\-|/ ]+)\]\s*)?(.*)$").expect("valid regex");
    let meta_re = Regex::new(
        r"^\s*-\s*\*\*Uses\*\*:\s*(\d+)\s*\|\s*\*\*Velocity\*\*:\s*([\d.]+)\s*\|\s*\*\*Learned\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Last\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Category\*\*:\s*(\w+)(?:\s*\|\s*\*\*Source\*\*:\s*(\w+))?",
    )
    .expect("valid regex");
    let legacy_meta_re = Regex::new(
        r"^\s*-\s*\*\*Uses\*\*:\s*(\d+)\s*\|\s*\*\*Learned\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Last\*\*:\s*(\d{4}-\d{2}-\d{2})\s*\|\s*\*\*Category\*\*:\s*(\w+)(?:\s*\|\s*\*\*Source\*\*:\s*(\w+))?",
    )
    .expect("valid regex");
    let content_re = Regex::new(r"^>\s?(.*)$").expect("valid regex");

    let header = header_re.captures(lines[start_idx])?;
    let id = header.get(1)?.as_str().to_string();
    let mut title = header.get(3)?.as_str().trim().to_string();

    // The robot marker is presentation for source=ai; strip it here.
    let mut source_from_title = None;
    if let Some(stripped) = title.strip_prefix(ROBOT_EMOJI) {
        title = stripped.trim().to_string();
        source_from_title = Some(LessonSource::Ai);
    }

    let meta_line = lines.get(start_idx + 1)?;

    let (uses, velocity, learned, last_used, category_str, source_str) =
        if let Some(m) = meta_re.captures(meta_line) {
            (
                m.get(1)?.as_str().parse::<u32>().ok()?,
                m.get(2)?.as_str().parse::<f64>().ok()?,
                m.get(3)?.as_str().to_string(),
                m.get(4)?.as_str().to_string(),
                m.get(5)?.as_str().to_string(),
                m.get(6).map(|s| s.as_str().to_string()),
            )
        } else if let Some(m) = legacy_meta_re.captures(meta_line) {
            (
                m.get(1)?.as_str().parse::<u32>().ok()?,
                0.0,
                m.get(2)?.as_str().to_string(),
                m.get(3)?.as_str().to_string(),
                m.get(4)?.as_str().to_string(),
                m.get(5).map(|s| s.as_str().to_string()),
            )
        } else {
            return None;
        };

    // Malformed date or unknown category terminates the block silently.
    let learned = NaiveDate::parse_from_str(&learned, "%Y-%m-%d").ok()?;
    let last_used = NaiveDate::parse_from_str(&last_used, "%Y-%m-%d").ok()?;
    let category = category_str.parse().ok()?;
    let source = match source_str {
        Some(s) => s.parse().ok()?,
        None => source_from_title.unwrap_or(LessonSource::Human),
    };
    let promotable = !meta_line.contains("**Promotable**: no");

    let mut content = String::new();
    let mut end_idx = start_idx + 2;
    if let Some(line) = lines.get(end_idx) {
        if let Some(m) = content_re.captures(line) {
            content = m.get(1).map(|c| c.as_str().to_string()).unwrap_or_default();
            end_idx += 1;
        }
    }

    // Swallow blank padding up to the next block.
    while end_idx < lines.len() && lines[end_idx].trim().is_empty() {
        end_idx += 1;
    }

    let lesson = Lesson {
        id,
        title,
        content,
        uses,
        velocity,
        learned,
        last_used,
        category,
        source,
        level,
        promotable,
    };

    Some((lesson, end_idx))
}

/// Format a lesson in the current grammar.
pub fn format_lesson(lesson: &Lesson) -> String {
    let rating = lesson.rating().format_legacy();

    let title_display = if lesson.source == LessonSource::Ai {
        format!("{ROBOT_EMOJI} {}", lesson.title)
    } else {
        lesson.title.clone()
    };

    let header = format!("### [{}] {} {}", lesson.id, rating, title_display);

    let mut meta_parts = vec![
        format!("**Uses**: {}", lesson.uses),
        format!("**Velocity**: {}", lesson.velocity),
        format!("**Learned**: {}", lesson.learned.format("%Y-%m-%d")),
        format!("**Last**: {}", lesson.last_used.format("%Y-%m-%d")),
        format!("**Category**: {}", lesson.category),
    ];
    if lesson.source == LessonSource::Ai {
        meta_parts.push("**Source**: ai".to_string());
    }
    if !lesson.promotable {
        meta_parts.push("**Promotable**: no".to_string());
    }

    format!(
        "{header}\n- {}\n> {}\n",
        meta_parts.join(" | "),
        lesson.content
    )
}
