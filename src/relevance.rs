//! Relevance scoring via an external model.
//!
//! The store hands the current lesson set and a query to a `claude`
//! subprocess and asks for `id: score` lines, 0-10. Every failure mode
//! (missing binary, non-zero exit, empty output, timeout) is captured in
//! the result's `error` field; scoring never raises.

use anyhow::Result;
use regex::Regex;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::models::constants::SCORE_RELEVANCE_MAX_QUERY_LEN;
use crate::models::{Lesson, RelevanceResult, ScoredLesson};
use crate::store::{LessonOps, Recall};

/// Environment flag set on the subprocess so session hooks do not recurse
/// into another scoring pass.
pub const SCORING_ACTIVE_ENV: &str = "LESSONS_SCORING_ACTIVE";

impl Recall {
    /// Score all lessons against `query_text`, sorted by (score desc,
    /// uses desc).
    pub fn score_relevance(&self, query_text: &str, timeout_secs: u64) -> Result<RelevanceResult> {
        let query: String = if query_text.chars().count() > SCORE_RELEVANCE_MAX_QUERY_LEN {
            format!(
                "{}...",
                query_text
                    .chars()
                    .take(SCORE_RELEVANCE_MAX_QUERY_LEN)
                    .collect::<String>()
            )
        } else {
            query_text.to_string()
        };

        let all_lessons = self.list_lessons(None, None, None, false)?;
        if all_lessons.is_empty() {
            return Ok(RelevanceResult {
                scored_lessons: Vec::new(),
                query_text: query,
                error: None,
            });
        }

        let lesson_count = all_lessons.len();
        let prompt = build_prompt(&query, &all_lessons);
        let start = Instant::now();
        let outcome = run_scorer(&prompt, Duration::from_secs(timeout_secs));
        let elapsed_ms = start.elapsed().as_millis();

        let result = match outcome {
            Ok(output) => {
                let scored = parse_scores(&output, all_lessons);
                if scored.is_empty() && output.trim().is_empty() {
                    RelevanceResult {
                        scored_lessons: Vec::new(),
                        query_text: query,
                        error: Some("empty response from scorer".to_string()),
                    }
                } else {
                    RelevanceResult {
                        scored_lessons: scored,
                        query_text: query,
                        error: None,
                    }
                }
            }
            Err(message) => RelevanceResult {
                scored_lessons: Vec::new(),
                query_text: query,
                error: Some(message),
            },
        };

        let top: Vec<(String, u8)> = result
            .scored_lessons
            .iter()
            .map(|s| (s.lesson.id.clone(), s.score))
            .collect();
        self.logger().relevance(
            result.query_text.chars().count(),
            lesson_count,
            elapsed_ms,
            &top,
            result.error.as_deref(),
        );

        Ok(result)
    }
}

fn build_prompt(query: &str, lessons: &[Lesson]) -> String {
    let lessons_text = lessons
        .iter()
        .map(|l| format!("[{}] {}: {}", l.id, l.title, l.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Score each lesson's relevance (0-10) to this query. 10 = highly relevant, 0 = not relevant.\n\n\
         Query: {query}\n\n\
         Lessons:\n{lessons_text}\n\n\
         Output ONLY lines in format: ID: SCORE\n\
         Example:\n\
         L001: 8\n\
         S002: 3\n\n\
         No explanations, just ID: SCORE lines."
    )
}

/// Run the scorer subprocess. Errors are returned as strings for the
/// result's error field.
fn run_scorer(prompt: &str, timeout: Duration) -> std::result::Result<String, String> {
    let mut child = Command::new("claude")
        .args(["-p", "--model", "haiku"])
        .env(SCORING_ACTIVE_ENV, "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                "claude CLI not found".to_string()
            } else {
                format!("failed to spawn claude: {e}")
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // A closed pipe means the child already exited; wait_timeout will
        // surface whatever it had to say.
        let _ = stdin.write_all(prompt.as_bytes());
    }

    // Drain stdout concurrently so a chatty child cannot deadlock on a
    // full pipe while we wait for it to exit.
    let mut stdout_handle = child.stdout.take();
    let stdout_thread = std::thread::spawn(move || {
        let mut out = String::new();
        if let Some(stdout) = stdout_handle.as_mut() {
            let _ = stdout.read_to_string(&mut out);
        }
        out
    });

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => {
            let stdout = stdout_thread.join().unwrap_or_default();
            if status.success() {
                Ok(stdout)
            } else {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                Err(format!("claude command failed: {}", stderr.trim()))
            }
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(format!(
                "scorer timed out after {}s",
                timeout.as_secs()
            ))
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(format!("failed to wait for claude: {e}"))
        }
    }
}

/// Parse `id: score` lines, clamp to 0-10, drop unknown ids, sort by
/// (score desc, uses desc).
fn parse_scores(output: &str, lessons: Vec<Lesson>) -> Vec<ScoredLesson> {
    let re = Regex::new(r"^\[?([LS]\d{3})\]?:\s*(\d+)").expect("valid regex");
    let mut by_id: std::collections::HashMap<String, Lesson> =
        lessons.into_iter().map(|l| (l.id.clone(), l)).collect();

    let mut scored = Vec::new();
    for line in output.lines() {
        let Some(caps) = re.captures(line.trim()) else {
            continue;
        };
        let id = caps.get(1).unwrap().as_str();
        let score = caps
            .get(2)
            .unwrap()
            .as_str()
            .parse::<u32>()
            .unwrap_or(0)
            .min(10) as u8;
        if let Some(lesson) = by_id.remove(id) {
            scored.push(ScoredLesson { lesson, score });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.lesson.uses.cmp(&a.lesson.uses))
    });
    scored
}
