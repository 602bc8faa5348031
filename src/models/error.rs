//! Error taxonomy for store operations.
//!
//! Domain failures are a small sum type so callers can distinguish a missing
//! id from bad input without string matching. They convert into
//! `anyhow::Error` at the command boundary, where every variant maps to
//! exit code 1.

use thiserror::Error;

/// Domain errors surfaced by the lesson and handoff stores.
///
/// I/O failures travel as `anyhow::Error` with path context; logging and
/// relevance-scoring failures are captured in their result types and never
/// raised through this enum.
#[derive(Debug, Error)]
pub enum RecallError {
    /// A lesson or handoff id that does not exist in the store.
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid enum value, malformed ref, or malformed JSON input.
    #[error("{0}")]
    Validation(String),

    /// A near-duplicate lesson already exists (add without --force).
    #[error("Similar lesson already exists: '{0}'")]
    Duplicate(String),
}

impl RecallError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        RecallError::NotFound(format!("{kind} {id}"))
    }
}
