//! Cross-module scenario tests for the recall store.

mod handoff_flow;
mod helpers;
mod lesson_flow;
mod resume_validation;
