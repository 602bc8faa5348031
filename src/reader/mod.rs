//! Observers over the event log and the markdown stores.
//!
//! These are read-only consumers: a tail-following log reader, a
//! lightweight state snapshot of the stores, and a statistics aggregator
//! computed from the buffered events.

pub mod log;
pub mod state;
pub mod stats;

pub use log::{format_event_line, parse_event, DebugEvent, LogReader};
pub use state::{DecayInfo, HandoffSummary, LessonSummary, StateReader};
pub use stats::{HealthStatus, StatsAggregator, SystemStats};
