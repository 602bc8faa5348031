//! Bidirectional mapping between markdown blocks and in-memory records.
//!
//! The parsers are line-oriented scanners keyed on `###` section headers.
//! They accept two generations of grammar (legacy and current), write the
//! current form back, and skip malformed blocks rather than aborting: a
//! corrupt record must not poison an entire file read.

pub mod handoff;
pub mod lesson;

pub use handoff::{format_handoff, parse_handoffs, validate_ref};
pub use lesson::{format_lesson, parse_lessons};
