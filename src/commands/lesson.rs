//! Lesson subcommand handlers.

use anyhow::Result;
use colored::Colorize;

use crate::models::lesson::ROBOT_EMOJI;
use crate::models::{LessonCategory, LessonLevel, LessonSource};
use crate::store::{LessonOps, Recall};

pub fn add(
    store: &Recall,
    category: &str,
    title: &str,
    content: &str,
    force: bool,
    system: bool,
    no_promote: bool,
) -> Result<()> {
    let level = if system {
        LessonLevel::System
    } else {
        LessonLevel::Project
    };
    let category: LessonCategory = category.parse()?;
    let promotable = !no_promote;

    let lesson_id = store.add_lesson(
        level,
        category,
        title,
        content,
        LessonSource::Human,
        force,
        promotable,
    )?;

    let promo_note = if promotable { "" } else { " (no-promote)" };
    println!("Added {level} lesson {lesson_id}: {title}{promo_note}");
    Ok(())
}

pub fn add_ai(
    store: &Recall,
    category: &str,
    title: &str,
    content: &str,
    system: bool,
    no_promote: bool,
) -> Result<()> {
    let level = if system {
        LessonLevel::System
    } else {
        LessonLevel::Project
    };
    let category: LessonCategory = category.parse()?;
    let promotable = !no_promote;

    let lesson_id = store.add_ai_lesson(level, category, title, content, promotable)?;

    let promo_note = if promotable { "" } else { " (no-promote)" };
    println!("Added AI {level} lesson {lesson_id}: {title}{promo_note}");
    Ok(())
}

pub fn cite(store: &Recall, lesson_id: &str) -> Result<()> {
    let result = store.cite_lesson(lesson_id)?;
    if result.promotion_ready {
        println!("PROMOTION_READY:{}:{}", result.lesson_id, result.uses);
    } else {
        println!("OK:{}", result.uses);
    }
    Ok(())
}

pub fn inject(store: &Recall, top_n: usize) -> Result<()> {
    // Session start from the agent's point of view: leave a marker so the
    // next decay pass knows the store was active.
    store.record_session_marker()?;
    let output = store.inject_lessons(top_n)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

pub fn list(
    store: &Recall,
    project: bool,
    system: bool,
    search: Option<&str>,
    category: Option<&str>,
    stale: bool,
) -> Result<()> {
    let scope = if project {
        Some(LessonLevel::Project)
    } else if system {
        Some(LessonLevel::System)
    } else {
        None
    };
    let category = category.map(|c| c.parse::<LessonCategory>()).transpose()?;

    let lessons = store.list_lessons(scope, search, category, stale)?;
    if lessons.is_empty() {
        println!("(no lessons found)");
        return Ok(());
    }

    for lesson in &lessons {
        let prefix = if lesson.source == LessonSource::Ai {
            format!("{ROBOT_EMOJI} ")
        } else {
            String::new()
        };
        let stale_tag = if lesson.is_stale() {
            " [STALE]".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "[{}] {} {}{}{}",
            lesson.id,
            lesson.rating().format(),
            prefix,
            lesson.title,
            stale_tag
        );
        println!("    -> {}", lesson.content);
    }
    println!("\nTotal: {} lesson(s)", lessons.len());
    Ok(())
}

pub fn decay(store: &Recall, days: i64) -> Result<()> {
    let result = store.decay_lessons(days)?;
    println!("{}", result.message);
    Ok(())
}

pub fn edit(store: &Recall, lesson_id: &str, content: &str) -> Result<()> {
    store.edit_lesson(lesson_id, content)?;
    println!("Updated {lesson_id} content");
    Ok(())
}

pub fn delete(store: &Recall, lesson_id: &str) -> Result<()> {
    store.delete_lesson(lesson_id)?;
    println!("Deleted {lesson_id}");
    Ok(())
}

pub fn promote(store: &Recall, lesson_id: &str) -> Result<()> {
    let new_id = store.promote_lesson(lesson_id)?;
    println!("Promoted {lesson_id} -> {new_id}");
    Ok(())
}
