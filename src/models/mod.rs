//! Data model for the recall store.
//!
//! Record types for lessons and handoffs, the enums that constrain their
//! fields, result types returned by store operations, and the error
//! taxonomy shared across the crate.

pub mod constants;
pub mod error;
pub mod handoff;
pub mod lesson;

pub use error::RecallError;
pub use handoff::{
    Agent, CompleteResult, Handoff, HandoffContext, HandoffStatus, Phase, ResumeResult, TodoItem,
    TodoStatus, TriedOutcome, TriedStep, ValidationReport,
};
pub use lesson::{
    CitationResult, DecayResult, InjectionResult, Lesson, LessonCategory, LessonLevel,
    LessonRating, LessonSource, RelevanceResult, ScoredLesson,
};
