//! Status subcommand: the text dashboard over the event log and stores.

use anyhow::Result;

use crate::reader::{LogReader, StateReader, StatsAggregator};

pub fn execute(project: Option<&str>, limit: usize) -> Result<()> {
    let reader = LogReader::new();
    let state = StateReader::from_env();
    let mut aggregator = StatsAggregator::new(reader, Some(state));

    println!("{}", aggregator.format_summary(project, limit));
    Ok(())
}
