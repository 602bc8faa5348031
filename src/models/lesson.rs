//! Lesson records and the result types returned by lesson operations.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::constants::LESSON_STALE_DAYS;

/// Marker prepended to AI-sourced lesson titles in the markdown store.
pub const ROBOT_EMOJI: &str = "\u{1f916}";

/// Storage scope of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonLevel {
    /// Stored per repository under the project data directory
    Project,
    /// Stored per user under the lessons base directory
    System,
}

impl LessonLevel {
    /// Id prefix used by this scope (`L` for project, `S` for system)
    pub fn id_prefix(&self) -> char {
        match self {
            LessonLevel::Project => 'L',
            LessonLevel::System => 'S',
        }
    }

    /// Capitalized name for file headers
    pub fn display_name(&self) -> &'static str {
        match self {
            LessonLevel::Project => "Project",
            LessonLevel::System => "System",
        }
    }

    /// Scope owning an id, judged by its prefix
    pub fn from_id(id: &str) -> LessonLevel {
        if id.starts_with('S') {
            LessonLevel::System
        } else {
            LessonLevel::Project
        }
    }
}

impl std::fmt::Display for LessonLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonLevel::Project => write!(f, "project"),
            LessonLevel::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for LessonLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(LessonLevel::Project),
            "system" => Ok(LessonLevel::System),
            _ => anyhow::bail!("Invalid level: {s}. Use: project, system"),
        }
    }
}

/// Kind of knowledge a lesson captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonCategory {
    /// A recurring approach worth repeating
    Pattern,
    /// Something done wrong once, with the fix
    Correction,
    /// A choice made with rationale
    Decision,
    /// A surprising behavior to watch for
    Gotcha,
    /// A human preference about how work should be done
    Preference,
}

impl LessonCategory {
    pub fn all() -> &'static [LessonCategory] {
        &[
            LessonCategory::Pattern,
            LessonCategory::Correction,
            LessonCategory::Decision,
            LessonCategory::Gotcha,
            LessonCategory::Preference,
        ]
    }
}

impl std::fmt::Display for LessonCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LessonCategory::Pattern => "pattern",
            LessonCategory::Correction => "correction",
            LessonCategory::Decision => "decision",
            LessonCategory::Gotcha => "gotcha",
            LessonCategory::Preference => "preference",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LessonCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" | "patterns" => Ok(LessonCategory::Pattern),
            "correction" | "corrections" => Ok(LessonCategory::Correction),
            "decision" | "decisions" => Ok(LessonCategory::Decision),
            "gotcha" | "gotchas" => Ok(LessonCategory::Gotcha),
            "preference" | "preferences" => Ok(LessonCategory::Preference),
            _ => anyhow::bail!(
                "Invalid category: {s}. Use: pattern, correction, decision, gotcha, preference"
            ),
        }
    }
}

/// Who recorded the lesson. Affects display decoration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonSource {
    Human,
    Ai,
}

impl std::fmt::Display for LessonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LessonSource::Human => write!(f, "human"),
            LessonSource::Ai => write!(f, "ai"),
        }
    }
}

impl std::str::FromStr for LessonSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LessonSource::Human),
            "ai" => Ok(LessonSource::Ai),
            _ => anyhow::bail!("Invalid source: {s}. Use: human, ai"),
        }
    }
}

/// A single persistent lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Stable token like `L001` or `S001`, never reused
    pub id: String,
    pub title: String,
    pub content: String,
    /// Cumulative citations, saturating at `MAX_USES`
    pub uses: u32,
    /// Recency signal, halved by each decay pass
    pub velocity: f64,
    pub learned: NaiveDate,
    pub last_used: NaiveDate,
    pub category: LessonCategory,
    pub source: LessonSource,
    pub level: LessonLevel,
    /// When false, never eligible for scope promotion regardless of uses
    pub promotable: bool,
}

impl Lesson {
    /// Rough token estimate: total characters over four, rounded up.
    pub fn tokens(&self) -> usize {
        let chars = self.title.chars().count() + self.content.chars().count();
        chars.div_ceil(4)
    }

    /// Stale means uncited for more than `LESSON_STALE_DAYS`.
    pub fn is_stale(&self) -> bool {
        let days = (Local::now().date_naive() - self.last_used).num_days();
        days > LESSON_STALE_DAYS
    }

    pub fn rating(&self) -> LessonRating {
        LessonRating::new(self.uses, self.velocity)
    }
}

/// Display rating derived from a lesson's metrics. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LessonRating {
    pub uses: u32,
    pub velocity: f64,
}

impl LessonRating {
    pub fn new(uses: u32, velocity: f64) -> Self {
        Self { uses, velocity }
    }

    /// Star count 1..=5 from cumulative uses.
    pub fn stars(&self) -> usize {
        match self.uses {
            0 => 0,
            1..=4 => 1,
            5..=14 => 2,
            15..=29 => 3,
            30..=49 => 4,
            _ => 5,
        }
    }

    /// Secondary trend glyph from velocity: `+` hot, `|` active, `-`
    /// cooling, nothing at zero.
    pub fn trend(&self) -> Option<char> {
        if self.velocity >= 5.0 {
            Some('+')
        } else if self.velocity >= 1.0 {
            Some('|')
        } else if self.velocity > 0.0 {
            Some('-')
        } else {
            None
        }
    }

    /// Unicode form for terminal display, e.g. `★★★+`.
    pub fn format(&self) -> String {
        let mut out = "★".repeat(self.stars());
        if let Some(t) = self.trend() {
            out.push(t);
        }
        out
    }

    /// ASCII form written into storage headers, e.g. `[***|]`.
    pub fn format_legacy(&self) -> String {
        let mut out = String::from("[");
        out.push_str(&"*".repeat(self.stars()));
        if let Some(t) = self.trend() {
            out.push(t);
        }
        out.push(']');
        out
    }
}

/// Outcome of citing a lesson
#[derive(Debug, Clone)]
pub struct CitationResult {
    pub lesson_id: String,
    pub uses: u32,
    pub velocity: f64,
    /// True when a project lesson crossed the promotion threshold
    pub promotion_ready: bool,
    pub message: String,
}

/// Lessons selected for session-start injection
#[derive(Debug, Clone, Default)]
pub struct InjectionResult {
    pub top_lessons: Vec<Lesson>,
    pub all_lessons: Vec<Lesson>,
    pub total_count: usize,
    pub system_count: usize,
    pub project_count: usize,
}

/// Outcome of a decay maintenance pass
#[derive(Debug, Clone)]
pub struct DecayResult {
    pub decayed_uses: usize,
    pub decayed_velocity: usize,
    pub sessions_since_last: usize,
    /// True when vacation mode skipped the pass entirely
    pub skipped: bool,
    pub message: String,
}

/// A lesson paired with its relevance score (0-10)
#[derive(Debug, Clone)]
pub struct ScoredLesson {
    pub lesson: Lesson,
    pub score: u8,
}

/// Result of an external relevance-scoring call. Failures populate `error`
/// and leave the list empty; they are never raised.
#[derive(Debug, Clone, Default)]
pub struct RelevanceResult {
    pub scored_lessons: Vec<ScoredLesson>,
    pub query_text: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_id() {
        assert_eq!(LessonLevel::from_id("S012"), LessonLevel::System);
        assert_eq!(LessonLevel::from_id("L003"), LessonLevel::Project);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(
            "PATTERN".parse::<LessonCategory>().unwrap(),
            LessonCategory::Pattern
        );
        assert_eq!(
            "gotchas".parse::<LessonCategory>().unwrap(),
            LessonCategory::Gotcha
        );
        assert!("bogus".parse::<LessonCategory>().is_err());
    }

    #[test]
    fn test_rating_stars() {
        assert_eq!(LessonRating::new(1, 0.0).stars(), 1);
        assert_eq!(LessonRating::new(5, 0.0).stars(), 2);
        assert_eq!(LessonRating::new(15, 0.0).stars(), 3);
        assert_eq!(LessonRating::new(30, 0.0).stars(), 4);
        assert_eq!(LessonRating::new(50, 0.0).stars(), 5);
        assert_eq!(LessonRating::new(100, 0.0).stars(), 5);
    }

    #[test]
    fn test_rating_trend_glyph() {
        assert_eq!(LessonRating::new(1, 6.0).format_legacy(), "[*+]");
        assert_eq!(LessonRating::new(1, 1.5).format_legacy(), "[*|]");
        assert_eq!(LessonRating::new(1, 0.5).format_legacy(), "[*-]");
        assert_eq!(LessonRating::new(1, 0.0).format_legacy(), "[*]");
    }

    #[test]
    fn test_tokens_rounds_up() {
        let lesson = Lesson {
            id: "L001".to_string(),
            title: "abc".to_string(),
            content: "de".to_string(),
            uses: 1,
            velocity: 0.0,
            learned: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_used: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            category: LessonCategory::Pattern,
            source: LessonSource::Human,
            level: LessonLevel::Project,
            promotable: true,
        };
        // 5 chars -> ceil(5/4) = 2
        assert_eq!(lesson.tokens(), 2);
    }
}
