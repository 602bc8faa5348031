//! Statistics aggregation over buffered log events.
//!
//! Computes a cached snapshot of today's counters, hook timing
//! percentiles, and event histograms, plus the health classification
//! consumers display.

use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::log::{DebugEvent, LogReader};
use super::state::StateReader;
use crate::reader::format_event_line;

/// How long a computed snapshot stays fresh.
const STATS_CACHE_TTL: Duration = Duration::from_secs(1);

/// Below this average hook time the system is healthy.
const HEALTH_OK_THRESHOLD_MS: f64 = 100.0;

/// Above this average hook time the system is degraded enough to warn.
const HEALTH_WARNING_THRESHOLD_MS: f64 = 200.0;

/// Aggregated system metrics.
#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    pub sessions_today: usize,
    pub citations_today: usize,
    pub errors_today: usize,
    pub avg_hook_ms: f64,
    pub p95_hook_ms: f64,
    pub max_hook_ms: f64,
    pub log_size_mb: f64,
    pub log_line_count: usize,
    pub events_by_type: HashMap<String, usize>,
    pub events_by_project: HashMap<String, usize>,
    pub hook_timings: HashMap<String, Vec<f64>>,
}

/// Health classification derived from a stats snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warning,
    Degraded,
}

impl SystemStats {
    pub fn health(&self) -> HealthStatus {
        if self.errors_today == 0 && self.avg_hook_ms < HEALTH_OK_THRESHOLD_MS {
            HealthStatus::Ok
        } else if self.errors_today > 0 || self.avg_hook_ms > HEALTH_WARNING_THRESHOLD_MS {
            HealthStatus::Warning
        } else {
            HealthStatus::Degraded
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Warning => write!(f, "WARNING"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
        }
    }
}

/// Per-hook timing rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSummary {
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
    pub count: usize,
}

/// Computes and caches [`SystemStats`] from a log reader's buffer.
pub struct StatsAggregator {
    log_reader: LogReader,
    state_reader: Option<StateReader>,
    cached: Option<(SystemStats, Instant)>,
}

impl StatsAggregator {
    pub fn new(log_reader: LogReader, state_reader: Option<StateReader>) -> Self {
        Self {
            log_reader,
            state_reader,
            cached: None,
        }
    }

    pub fn log_reader_mut(&mut self) -> &mut LogReader {
        &mut self.log_reader
    }

    /// Compute the snapshot, serving the cached copy inside the TTL.
    pub fn compute(&mut self) -> SystemStats {
        if let Some((stats, at)) = &self.cached {
            if at.elapsed() < STATS_CACHE_TTL {
                return stats.clone();
            }
        }

        self.log_reader.load_buffer();
        let today = Utc::now().date_naive();

        let mut stats = SystemStats::default();
        let mut all_timings = Vec::new();

        for event in self.log_reader.iter_events() {
            *stats.events_by_type.entry(event.event.clone()).or_insert(0) += 1;
            if !event.project.is_empty() {
                *stats
                    .events_by_project
                    .entry(event.project.clone())
                    .or_insert(0) += 1;
            }

            let is_today = event
                .timestamp_dt()
                .map(|dt| dt.date_naive() == today)
                .unwrap_or(false);
            if is_today {
                match event.event.as_str() {
                    "session_start" => stats.sessions_today += 1,
                    "citation" => stats.citations_today += 1,
                    _ => {}
                }
                if event.is_error() {
                    stats.errors_today += 1;
                }
            }

            if event.is_timing() {
                if let Some(ms) = extract_hook_timing(event) {
                    all_timings.push(ms);
                    let hook = event
                        .get("hook")
                        .or_else(|| event.get("op"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_string();
                    stats.hook_timings.entry(hook).or_default().push(ms);
                }
            }
        }

        if !all_timings.is_empty() {
            stats.avg_hook_ms =
                round2(all_timings.iter().sum::<f64>() / all_timings.len() as f64);
            stats.p95_hook_ms = round2(percentile(&all_timings, 95.0));
            stats.max_hook_ms = round2(all_timings.iter().cloned().fold(0.0, f64::max));
        }

        stats.log_line_count = self.log_reader.buffer_size();
        stats.log_size_mb = round2(self.log_reader.log_size_bytes() as f64 / (1024.0 * 1024.0));

        self.cached = Some((stats.clone(), Instant::now()));
        stats
    }

    pub fn invalidate_cache(&mut self) {
        self.cached = None;
    }

    /// Per-hook timing rollups from a snapshot.
    pub fn timing_summary(&mut self) -> HashMap<String, TimingSummary> {
        let stats = self.compute();
        stats
            .hook_timings
            .iter()
            .filter(|(_, timings)| !timings.is_empty())
            .map(|(hook, timings)| {
                (
                    hook.clone(),
                    TimingSummary {
                        avg_ms: round2(timings.iter().sum::<f64>() / timings.len() as f64),
                        p95_ms: round2(percentile(timings, 95.0)),
                        max_ms: round2(timings.iter().cloned().fold(0.0, f64::max)),
                        count: timings.len(),
                    },
                )
            })
            .collect()
    }

    /// Metrics scoped to one session.
    pub fn session_stats(&mut self, session_id: &str) -> HashMap<String, serde_json::Value> {
        let events = self.log_reader.filter(None, Some(session_id), None, None);
        let mut out = HashMap::new();
        out.insert("session_id".to_string(), serde_json::json!(session_id));
        out.insert("event_count".to_string(), serde_json::json!(events.len()));
        out.insert(
            "citations".to_string(),
            serde_json::json!(events.iter().filter(|e| e.event == "citation").count()),
        );
        out.insert(
            "errors".to_string(),
            serde_json::json!(events.iter().filter(|e| e.is_error()).count()),
        );

        let timestamps: Vec<_> = events.iter().filter_map(|e| e.timestamp_dt()).collect();
        let duration_ms = match (timestamps.iter().min(), timestamps.iter().max()) {
            (Some(min), Some(max)) if timestamps.len() >= 2 => {
                (*max - *min).num_milliseconds() as f64
            }
            _ => 0.0,
        };
        out.insert("duration_ms".to_string(), serde_json::json!(duration_ms));
        out.insert(
            "project".to_string(),
            serde_json::json!(events.first().map(|e| e.project.clone()).unwrap_or_default()),
        );
        out
    }

    /// Metrics scoped to one project.
    pub fn project_stats(&mut self, project: &str) -> HashMap<String, serde_json::Value> {
        let events = self.log_reader.filter(Some(project), None, None, None);
        let sessions: std::collections::HashSet<&str> = events
            .iter()
            .filter(|e| !e.session_id.is_empty())
            .map(|e| e.session_id.as_str())
            .collect();

        let mut out = HashMap::new();
        out.insert("project".to_string(), serde_json::json!(project));
        out.insert("event_count".to_string(), serde_json::json!(events.len()));
        out.insert(
            "citations".to_string(),
            serde_json::json!(events.iter().filter(|e| e.event == "citation").count()),
        );
        out.insert(
            "errors".to_string(),
            serde_json::json!(events.iter().filter(|e| e.is_error()).count()),
        );
        out.insert("sessions".to_string(), serde_json::json!(sessions.len()));
        out
    }

    /// Most recent error events, newest first.
    pub fn recent_errors(&mut self, limit: usize) -> Vec<DebugEvent> {
        self.log_reader.load_buffer();
        let mut errors: Vec<DebugEvent> = self
            .log_reader
            .iter_events()
            .filter(|e| e.is_error())
            .cloned()
            .collect();
        errors.reverse();
        errors.truncate(limit);
        errors
    }

    /// Multi-line text dashboard.
    pub fn format_summary(&mut self, project: Option<&str>, limit: usize) -> String {
        let stats = self.compute();

        let mut lines = vec![
            "=== Recall Status ===".to_string(),
            format!(
                "Sessions today: {} | Citations: {} | Errors: {}",
                stats.sessions_today, stats.citations_today, stats.errors_today
            ),
            String::new(),
            format!(
                "HEALTH: {} (avg hook: {:.0}ms, p95: {:.0}ms)",
                stats.health(),
                stats.avg_hook_ms,
                stats.p95_hook_ms
            ),
            format!(
                "Log: {:.1}MB ({} events buffered)",
                stats.log_size_mb, stats.log_line_count
            ),
            String::new(),
        ];

        let mut events = self.log_reader.read_recent(limit);
        if let Some(project) = project {
            events.retain(|e| e.project == project);
        }
        if !events.is_empty() {
            lines.push(format!("RECENT ({} events):", events.len()));
            for event in &events {
                lines.push(format!("  {}", format_event_line(event, true)));
            }
            lines.push(String::new());
        }

        if let Some(state) = &self.state_reader {
            let (system, project_count) = state.lesson_counts();
            lines.push(format!("LESSONS: {system}S / {project_count}L"));

            let handoffs = state.active_handoffs();
            if !handoffs.is_empty() {
                lines.push(format!("HANDOFFS ({} active):", handoffs.len()));
                for h in handoffs.iter().take(5) {
                    lines.push(format!(
                        "  [{}] {} ({}, {})",
                        h.id, h.title, h.status, h.phase
                    ));
                }
            }
            lines.push(String::new());
        }

        if !stats.events_by_type.is_empty() {
            let mut types: Vec<(&String, &usize)> = stats.events_by_type.iter().collect();
            types.sort_by(|a, b| a.0.cmp(b.0));
            let type_str = types
                .iter()
                .map(|(t, c)| format!("{t}: {c}"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("Events: {type_str}"));
        }

        if !stats.events_by_project.is_empty() {
            let mut projects: Vec<(&String, &usize)> = stats.events_by_project.iter().collect();
            projects.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            let proj_str = projects
                .iter()
                .take(5)
                .map(|(p, c)| format!("{p}: {c}"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("Projects: {proj_str}"));
        }

        lines.join("\n")
    }
}

fn extract_hook_timing(event: &DebugEvent) -> Option<f64> {
    match event.event.as_str() {
        "hook_end" => event.get_f64("total_ms"),
        "timing" | "hook_phase" => event.get_f64("ms"),
        _ => None,
    }
}

/// p-th percentile by linear interpolation on sorted values.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let k = (n - 1) as f64 * p / 100.0;
    let f = k.floor() as usize;
    let c = f + 1;

    if c >= n {
        return sorted[n - 1];
    }
    sorted[f] + (k - f as f64) * (sorted[c] - sorted[f])
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
