//! Relevance-scoring subcommand handler.

use anyhow::Result;

use crate::store::Recall;

pub fn score(store: &Recall, text: &str, top: usize, min_score: u8, timeout: u64) -> Result<()> {
    let result = store.score_relevance(text, timeout)?;

    if let Some(error) = &result.error {
        // Scoring failures are soft: report and leave the caller's flow alone.
        println!("(scoring unavailable: {error})");
        return Ok(());
    }

    let visible: Vec<_> = result
        .scored_lessons
        .iter()
        .filter(|s| s.score >= min_score)
        .take(top)
        .collect();

    if visible.is_empty() {
        println!("(no relevant lessons)");
        return Ok(());
    }

    for scored in visible {
        println!(
            "[{}] {}/10 {} - {}",
            scored.lesson.id, scored.score, scored.lesson.title, scored.lesson.content
        );
    }
    Ok(())
}
