//! CLI command handlers: thin printing glue over the store.
//!
//! Handlers parse enum arguments, call the store, and print. Domain errors
//! bubble up as `anyhow::Error` and reach the user as `Error: …` with exit
//! code 1.

pub mod handoff;
pub mod lesson;
pub mod relevance;
pub mod status;
