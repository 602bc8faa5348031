//! Structured JSON-lines event log.
//!
//! Every store mutation emits an event here. Records are newline-terminated
//! JSON objects appended to `<state>/debug.log`, rotated by size. A write
//! is a single `write()` call so concurrent processes interleave whole
//! lines, not fragments.
//!
//! Levels: 0 disabled, 1 info, 2 debug (adds timings), 3 trace (adds file
//! I/O and lock waits). The level comes from `CLAUDE_RECALL_DEBUG`,
//! `RECALL_DEBUG`, or `LESSONS_DEBUG` (first set wins; non-numeric truthy
//! values mean 1), then `~/.claude/settings.json`, then defaults to 1.
//!
//! Logging must never fail the caller: I/O errors are swallowed, with a
//! single stderr note at trace level.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use crate::fs::paths;

/// Rotate the log once it crosses this size.
const MAX_LOG_SIZE_MB: u64 = 50;

/// Rotated generations kept on disk (`.1` through `.3`).
const MAX_LOG_FILES: u32 = 3;

const LOG_FILE_NAME: &str = "debug.log";

/// JSON-lines event logger.
///
/// One instance per process, owned by the store facade and passed through
/// the API. The session id is generated lazily and memoized for the
/// lifetime of the instance.
pub struct EventLogger {
    level: u8,
    log_path: Option<PathBuf>,
    session_id: OnceLock<String>,
}

impl EventLogger {
    /// Resolve level and log path from the environment.
    pub fn from_env() -> Self {
        let level = resolve_debug_level();
        let log_path = (level > 0).then(paths::log_path);
        Self {
            level,
            log_path,
            session_id: OnceLock::new(),
        }
    }

    /// A logger that drops everything. Useful in tests.
    pub fn disabled() -> Self {
        Self {
            level: 0,
            log_path: None,
            session_id: OnceLock::new(),
        }
    }

    /// A logger writing to an explicit file at an explicit level.
    pub fn with_log_path(level: u8, log_path: PathBuf) -> Self {
        Self {
            level,
            log_path: (level > 0).then_some(log_path),
            session_id: OnceLock::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.level > 0
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// 12-hex id correlating all events from this process.
    pub fn session_id(&self) -> &str {
        self.session_id
            .get_or_init(|| uuid::Uuid::new_v4().simple().to_string()[..12].to_string())
    }

    /// Append one event. Below-level writes are discarded with no I/O.
    fn write(&self, min_level: u8, level_name: &str, event: &str, fields: Value) {
        if self.level < min_level {
            return;
        }
        let Some(log_path) = &self.log_path else {
            return;
        };

        let mut record = Map::new();
        record.insert("event".to_string(), json!(event));
        record.insert("level".to_string(), json!(level_name));
        record.insert(
            "timestamp".to_string(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        record.insert("session_id".to_string(), json!(self.session_id()));
        record.insert("pid".to_string(), json!(std::process::id()));
        if let Ok(project_dir) = env::var("PROJECT_DIR") {
            if !project_dir.is_empty() {
                let name = Path::new(&project_dir)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                record.insert("project".to_string(), json!(name));
            }
        }
        if let Value::Object(extra) = fields {
            for (k, v) in extra {
                record.insert(k, v);
            }
        }

        if let Err(e) = append_record(log_path, &Value::Object(record)) {
            if self.level >= 3 {
                eprintln!("[event_log] write failed: {e}");
            }
        }
    }

    // ------------------------------------------------------------------
    // Level 1: info events
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn session_start(
        &self,
        project_root: &str,
        lessons_base: &str,
        total_lessons: usize,
        system_count: usize,
        project_count: usize,
        top_lessons: &[(String, u32)],
        total_tokens: usize,
    ) {
        let top: Vec<Value> = top_lessons
            .iter()
            .take(10)
            .map(|(id, uses)| json!({"id": id, "uses": uses}))
            .collect();
        self.write(
            1,
            "info",
            "session_start",
            json!({
                "project_root": project_root,
                "lessons_base": lessons_base,
                "total_lessons": total_lessons,
                "system_count": system_count,
                "project_count": project_count,
                "top_lessons": top,
                "total_tokens": total_tokens,
            }),
        );
    }

    pub fn citation(
        &self,
        lesson_id: &str,
        uses_before: u32,
        uses_after: u32,
        velocity_before: f64,
        velocity_after: f64,
        promotion_ready: bool,
    ) {
        self.write(
            1,
            "info",
            "citation",
            json!({
                "lesson_id": lesson_id,
                "uses_before": uses_before,
                "uses_after": uses_after,
                "velocity_before": velocity_before,
                "velocity_after": velocity_after,
                "promotion_ready": promotion_ready,
            }),
        );
    }

    pub fn lesson_added(
        &self,
        lesson_id: &str,
        level: &str,
        category: &str,
        source: &str,
        title_length: usize,
        content_length: usize,
    ) {
        self.write(
            1,
            "info",
            "lesson_added",
            json!({
                "lesson_id": lesson_id,
                "lesson_level": level,
                "category": category,
                "source": source,
                "title_length": title_length,
                "content_length": content_length,
            }),
        );
    }

    pub fn decay_result(
        &self,
        decayed_uses: usize,
        decayed_velocity: usize,
        sessions_since_last: usize,
        skipped: bool,
    ) {
        self.write(
            1,
            "info",
            "decay_result",
            json!({
                "decayed_uses": decayed_uses,
                "decayed_velocity": decayed_velocity,
                "sessions_since_last": sessions_since_last,
                "skipped": skipped,
            }),
        );
    }

    pub fn handoff_created(&self, handoff_id: &str, title: &str, phase: &str, agent: &str) {
        self.write(
            1,
            "info",
            "handoff_created",
            json!({
                "handoff_id": handoff_id,
                "title": title,
                "phase": phase,
                "agent": agent,
            }),
        );
    }

    pub fn handoff_change(
        &self,
        handoff_id: &str,
        action: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        self.write(
            1,
            "info",
            "handoff_change",
            json!({
                "handoff_id": handoff_id,
                "action": action,
                "old_value": old_value,
                "new_value": new_value,
            }),
        );
    }

    pub fn handoff_completed(
        &self,
        handoff_id: &str,
        tried_count: usize,
        duration_days: Option<i64>,
    ) {
        self.write(
            1,
            "info",
            "handoff_completed",
            json!({
                "handoff_id": handoff_id,
                "tried_count": tried_count,
                "duration_days": duration_days,
            }),
        );
    }

    pub fn error(&self, operation: &str, error: &str) {
        self.write(
            1,
            "error",
            "error",
            json!({"op": operation, "err": error}),
        );
    }

    pub fn mutation(&self, op: &str, target: &str, details: Value) {
        let mut fields = Map::new();
        fields.insert("op".to_string(), json!(op));
        fields.insert("target".to_string(), json!(target));
        if let Value::Object(extra) = details {
            for (k, v) in extra {
                fields.insert(k, v);
            }
        }
        self.write(1, "info", "mutation", Value::Object(fields));
    }

    // ------------------------------------------------------------------
    // Level 2: debug events
    // ------------------------------------------------------------------

    /// Scoped timer. On drop, emits a `timing` event with `ms` rounded to
    /// two decimals plus any supplied context keys.
    pub fn timer(&self, operation: &str, context: Value) -> Timer<'_> {
        Timer {
            logger: self,
            operation: operation.to_string(),
            context,
            start: Instant::now(),
        }
    }

    /// Record hook start; the returned instant is handed to `hook_end`.
    pub fn hook_start(&self, hook_name: &str, trigger: Option<&str>) -> Instant {
        let start = Instant::now();
        let mut fields = Map::new();
        fields.insert("hook".to_string(), json!(hook_name));
        if let Some(t) = trigger {
            fields.insert("trigger".to_string(), json!(t));
        }
        self.write(2, "debug", "hook_start", Value::Object(fields));
        start
    }

    pub fn hook_end(&self, hook_name: &str, start: Instant, phases: &[(&str, f64)]) {
        let total_ms = round2(start.elapsed().as_secs_f64() * 1000.0);
        let mut fields = Map::new();
        fields.insert("hook".to_string(), json!(hook_name));
        fields.insert("total_ms".to_string(), json!(total_ms));
        if !phases.is_empty() {
            let map: Map<String, Value> = phases
                .iter()
                .map(|(name, ms)| (name.to_string(), json!(round2(*ms))))
                .collect();
            fields.insert("phases".to_string(), Value::Object(map));
        }
        self.write(2, "debug", "hook_end", Value::Object(fields));
    }

    pub fn hook_phase(&self, hook_name: &str, phase: &str, duration_ms: f64) {
        self.write(
            2,
            "debug",
            "hook_phase",
            json!({
                "hook": hook_name,
                "phase": phase,
                "ms": round2(duration_ms),
            }),
        );
    }

    pub fn relevance(
        &self,
        query_len: usize,
        lesson_count: usize,
        duration_ms: u128,
        top_scores: &[(String, u8)],
        error: Option<&str>,
    ) {
        let top: Vec<Value> = top_scores
            .iter()
            .take(3)
            .map(|(id, score)| json!([id, score]))
            .collect();
        let mut fields = Map::new();
        fields.insert("q_len".to_string(), json!(query_len));
        fields.insert("lessons".to_string(), json!(lesson_count));
        fields.insert("ms".to_string(), json!(duration_ms));
        fields.insert("top".to_string(), json!(top));
        if let Some(err) = error {
            fields.insert("err".to_string(), json!(err));
        }
        self.write(2, "debug", "relevance", Value::Object(fields));
    }

    pub fn injection_generated(
        &self,
        token_budget: usize,
        lessons_included: usize,
        lessons_excluded: usize,
        included_ids: &[String],
    ) {
        self.write(
            2,
            "debug",
            "injection_generated",
            json!({
                "token_budget": token_budget,
                "lessons_included": lessons_included,
                "lessons_excluded": lessons_excluded,
                "included_ids": included_ids.iter().take(20).collect::<Vec<_>>(),
            }),
        );
    }

    // ------------------------------------------------------------------
    // Level 3: trace events
    // ------------------------------------------------------------------

    pub fn file_io(&self, operation: &str, file_path: &Path, duration_ms: f64) {
        self.write(
            3,
            "trace",
            "file_io",
            json!({
                "operation": operation,
                "file_path": file_path.display().to_string(),
                "duration_ms": round2(duration_ms),
            }),
        );
    }

    pub fn lock_acquired(&self, file_path: &Path, wait_ms: f64) {
        self.write(
            3,
            "trace",
            "lock_acquired",
            json!({
                "file_path": file_path.display().to_string(),
                "wait_ms": round2(wait_ms),
            }),
        );
    }

    pub fn function_call(&self, function: &str, duration_ms: f64) {
        self.write(
            3,
            "trace",
            "function_call",
            json!({
                "function": function,
                "duration_ms": round2(duration_ms),
            }),
        );
    }
}

/// Guard emitting a `timing` event when it goes out of scope.
pub struct Timer<'a> {
    logger: &'a EventLogger,
    operation: String,
    context: Value,
    start: Instant,
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        let ms = round2(self.start.elapsed().as_secs_f64() * 1000.0);
        let mut fields = Map::new();
        fields.insert("op".to_string(), json!(self.operation));
        fields.insert("ms".to_string(), json!(ms));
        if let Value::Object(extra) = self.context.take() {
            for (k, v) in extra {
                fields.insert(k, v);
            }
        }
        self.logger.write(2, "debug", "timing", Value::Object(fields));
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn append_record(log_path: &Path, record: &Value) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_if_needed(log_path)?;

    let mut line = serde_json::to_string(record).unwrap_or_default();
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
    // One write call per line; the kernel's small-write atomicity keeps
    // concurrent appenders from interleaving within a line.
    file.write_all(line.as_bytes())
}

/// Shift rotated generations and start a fresh file once the current log
/// crosses the size cap: delete `.3`, `.2`->`.3`, `.1`->`.2`, current->`.1`.
fn rotate_if_needed(log_path: &Path) -> std::io::Result<()> {
    let Ok(meta) = fs::metadata(log_path) else {
        return Ok(());
    };
    if meta.len() < MAX_LOG_SIZE_MB * 1024 * 1024 {
        return Ok(());
    }

    let rotated = |n: u32| log_path.with_file_name(format!("{LOG_FILE_NAME}.{n}"));

    let oldest = rotated(MAX_LOG_FILES);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..MAX_LOG_FILES).rev() {
        let from = rotated(i);
        if from.exists() {
            fs::rename(&from, rotated(i + 1))?;
        }
    }
    fs::rename(log_path, rotated(1))
}

/// Debug level resolution: env chain, then settings file, then 1.
fn resolve_debug_level() -> u8 {
    let env_value = ["CLAUDE_RECALL_DEBUG", "RECALL_DEBUG", "LESSONS_DEBUG"]
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()));

    if let Some(value) = env_value {
        return match value.parse::<u8>() {
            Ok(level) => level,
            Err(_) => {
                if matches!(value.to_lowercase().as_str(), "true" | "yes" | "on") {
                    1
                } else {
                    0
                }
            }
        };
    }

    if let Some(level) = read_settings_debug_level() {
        return level;
    }

    1
}

/// `claudeRecall.debugLevel` from `~/.claude/settings.json`, if present.
fn read_settings_debug_level() -> Option<u8> {
    let settings_path = dirs::home_dir()?.join(".claude").join("settings.json");
    let content = fs::read_to_string(settings_path).ok()?;
    let settings: Value = serde_json::from_str(&content).ok()?;
    settings
        .get("claudeRecall")?
        .get("debugLevel")?
        .as_u64()
        .map(|l| l.min(u8::MAX as u64) as u8)
}
