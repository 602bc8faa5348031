//! Buffered reading of the JSONL event log.
//!
//! The reader keeps a bounded ring of parsed events and reads
//! incrementally from the last observed byte offset. Rotation is detected
//! by inode change, after which the new file is read from the beginning.
//! Malformed lines are dropped silently.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::fs::paths;

/// One parsed log event with its raw payload retained.
#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub event: String,
    pub level: String,
    pub timestamp: String,
    pub session_id: String,
    pub pid: u64,
    pub project: String,
    pub raw: Value,
}

impl DebugEvent {
    pub fn timestamp_dt(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_error(&self) -> bool {
        self.level == "error" || self.event == "error"
    }

    pub fn is_timing(&self) -> bool {
        matches!(self.event.as_str(), "timing" | "hook_end" | "hook_phase")
    }

    /// Access an event-specific field from the raw payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.raw.get(key).and_then(|v| v.as_f64())
    }
}

/// Parse a single JSON line, or None for blank/malformed input.
pub fn parse_event(line: &str) -> Option<DebugEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let data: Value = serde_json::from_str(line).ok()?;

    Some(DebugEvent {
        event: data
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        level: data
            .get("level")
            .and_then(|v| v.as_str())
            .unwrap_or("info")
            .to_string(),
        timestamp: data
            .get("timestamp")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        session_id: data
            .get("session_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        pid: data.get("pid").and_then(|v| v.as_u64()).unwrap_or(0),
        project: data
            .get("project")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        raw: data,
    })
}

/// Tail reader with a bounded event buffer.
pub struct LogReader {
    log_path: PathBuf,
    buffer: VecDeque<DebugEvent>,
    max_buffer: usize,
    last_position: u64,
    last_inode: Option<u64>,
}

impl LogReader {
    pub const DEFAULT_BUFFER: usize = 1000;

    /// Reader over the default log path.
    pub fn new() -> Self {
        Self::with_path(paths::log_path(), Self::DEFAULT_BUFFER)
    }

    pub fn with_path(log_path: PathBuf, max_buffer: usize) -> Self {
        Self {
            log_path,
            buffer: VecDeque::with_capacity(max_buffer),
            max_buffer,
            last_position: 0,
            last_inode: None,
        }
    }

    pub fn log_path(&self) -> &std::path::Path {
        &self.log_path
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Detect rotation via inode change; on rotation the read offset is
    /// reset so the new file is consumed from the start.
    fn check_rotation(&mut self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.log_path) else {
            return false;
        };
        let inode = file_identity(&meta);
        if let Some(last) = self.last_inode {
            if inode != last {
                self.last_position = 0;
                self.last_inode = Some(inode);
                return true;
            }
        }
        self.last_inode = Some(inode);
        false
    }

    /// Read newly appended events into the buffer. Returns how many were
    /// loaded. Only complete (newline-terminated) lines are consumed, so a
    /// line caught mid-append is picked up whole on the next call.
    pub fn load_buffer(&mut self) -> usize {
        if !self.log_path.exists() {
            return 0;
        }

        self.check_rotation();

        let Ok(mut file) = File::open(&self.log_path) else {
            return 0;
        };
        if file.seek(SeekFrom::Start(self.last_position)).is_err() {
            return 0;
        }

        let mut chunk = String::new();
        if file.read_to_string(&mut chunk).is_err() {
            return 0;
        }

        let complete_len = match chunk.rfind('\n') {
            Some(pos) => pos + 1,
            None => return 0,
        };

        let mut new_count = 0;
        for line in chunk[..complete_len].lines() {
            if let Some(event) = parse_event(line) {
                if self.buffer.len() == self.max_buffer {
                    self.buffer.pop_front();
                }
                self.buffer.push_back(event);
                new_count += 1;
            }
        }

        self.last_position += complete_len as u64;
        new_count
    }

    /// Last `n` buffered events, oldest first.
    pub fn read_recent(&mut self, n: usize) -> Vec<DebugEvent> {
        self.load_buffer();
        let len = self.buffer.len();
        self.buffer
            .iter()
            .skip(len.saturating_sub(n))
            .cloned()
            .collect()
    }

    pub fn read_all(&mut self) -> Vec<DebugEvent> {
        self.load_buffer();
        self.buffer.iter().cloned().collect()
    }

    /// Filter by any conjunction of criteria. Project matching is
    /// case-insensitive.
    pub fn filter(
        &mut self,
        project: Option<&str>,
        session_id: Option<&str>,
        event_type: Option<&str>,
        level: Option<&str>,
    ) -> Vec<DebugEvent> {
        self.load_buffer();

        self.buffer
            .iter()
            .filter(|e| {
                project
                    .map(|p| e.project.eq_ignore_ascii_case(p))
                    .unwrap_or(true)
                    && session_id.map(|s| e.session_id == s).unwrap_or(true)
                    && event_type.map(|t| e.event == t).unwrap_or(true)
                    && level.map(|l| e.level == l).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Unique session ids, most recent first.
    pub fn sessions(&mut self) -> Vec<String> {
        self.load_buffer();
        let mut seen = Vec::new();
        for event in self.buffer.iter().rev() {
            if !event.session_id.is_empty() && !seen.contains(&event.session_id) {
                seen.push(event.session_id.clone());
            }
        }
        seen
    }

    /// Unique project names, most frequent first.
    pub fn projects(&mut self) -> Vec<String> {
        self.load_buffer();
        let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for event in &self.buffer {
            if !event.project.is_empty() {
                *counts.entry(event.project.clone()).or_insert(0) += 1;
            }
        }
        let mut projects: Vec<(String, usize)> = counts.into_iter().collect();
        projects.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        projects.into_iter().map(|(p, _)| p).collect()
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn log_size_bytes(&self) -> u64 {
        std::fs::metadata(&self.log_path)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &DebugEvent> {
        self.buffer.iter()
    }
}

impl Default for LogReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_identity(meta: &std::fs::Metadata) -> u64 {
    // Without inodes, fall back to creation time as a rotation signal.
    meta.created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Format one event as a compact colorized line for tail output.
pub fn format_event_line(event: &DebugEvent, color: bool) -> String {
    let time_part = event
        .timestamp_dt()
        .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| {
            event
                .timestamp
                .split('T')
                .nth(1)
                .map(|t| t.chars().take(8).collect())
                .unwrap_or_else(|| event.timestamp.chars().take(8).collect())
        });

    let details = match event.event.as_str() {
        "session_start" => {
            let total = event.get_f64("total_lessons").unwrap_or(0.0) as u64;
            let sys = event.get_f64("system_count").unwrap_or(0.0) as u64;
            let proj = event.get_f64("project_count").unwrap_or(0.0) as u64;
            format!("{sys}S/{proj}L ({total} total)")
        }
        "citation" => {
            let id = event.get("lesson_id").and_then(|v| v.as_str()).unwrap_or("?");
            let before = event.get_f64("uses_before").unwrap_or(0.0) as u64;
            let after = event.get_f64("uses_after").unwrap_or(0.0) as u64;
            let promo = if event
                .get("promotion_ready")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                " PROMO!"
            } else {
                ""
            };
            format!("{id} ({before}→{after}){promo}")
        }
        "decay_result" => {
            let uses = event.get_f64("decayed_uses").unwrap_or(0.0) as u64;
            let vel = event.get_f64("decayed_velocity").unwrap_or(0.0) as u64;
            format!("{uses} uses, {vel} velocity decayed")
        }
        "error" => {
            let op = event.get("op").and_then(|v| v.as_str()).unwrap_or("");
            let err: String = event
                .get("err")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .chars()
                .take(50)
                .collect();
            format!("{op}: {err}")
        }
        "hook_end" => {
            let hook = event.get("hook").and_then(|v| v.as_str()).unwrap_or("");
            let ms = event.get_f64("total_ms").unwrap_or(0.0);
            format!("{hook}: {ms:.0}ms")
        }
        "hook_phase" => {
            let hook = event.get("hook").and_then(|v| v.as_str()).unwrap_or("");
            let phase = event.get("phase").and_then(|v| v.as_str()).unwrap_or("");
            let ms = event.get_f64("ms").unwrap_or(0.0);
            format!("{hook}.{phase}: {ms:.0}ms")
        }
        "handoff_created" => {
            let id = event.get("handoff_id").and_then(|v| v.as_str()).unwrap_or("");
            let title: String = event
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .chars()
                .take(30)
                .collect();
            format!("{id} {title}")
        }
        "handoff_completed" => {
            let id = event.get("handoff_id").and_then(|v| v.as_str()).unwrap_or("");
            let tried = event.get_f64("tried_count").unwrap_or(0.0) as u64;
            format!("{id} ({tried} steps)")
        }
        "lesson_added" => {
            let id = event.get("lesson_id").and_then(|v| v.as_str()).unwrap_or("");
            let level = event.get("lesson_level").and_then(|v| v.as_str()).unwrap_or("");
            format!("{id} ({level})")
        }
        _ => {
            // Generic fallback: first event-specific field.
            const SKIP: [&str; 6] = ["event", "level", "timestamp", "session_id", "pid", "project"];
            event
                .raw
                .as_object()
                .and_then(|obj| {
                    obj.iter()
                        .find(|(k, _)| !SKIP.contains(&k.as_str()))
                        .map(|(k, v)| format!("{k}={v}"))
                })
                .unwrap_or_default()
        }
    };

    let project = format!("{:<15}", event.project.chars().take(15).collect::<String>());
    let event_name = format!("{:<18}", event.event.chars().take(18).collect::<String>());
    let line = format!("[{time_part}] {event_name} {project} {details}");

    if !color {
        return line;
    }

    match event.event.as_str() {
        "session_start" => line.cyan().to_string(),
        "citation" => line.green().to_string(),
        "error" => line.red().bold().to_string(),
        "decay_result" => line.yellow().to_string(),
        "handoff_created" | "handoff_change" | "handoff_completed" => line.magenta().to_string(),
        "timing" | "hook_start" | "hook_end" | "hook_phase" => line.dimmed().to_string(),
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_line(path: &std::path::Path, line: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        writeln!(f, "{line}").unwrap();
    }

    fn event_json(event: &str, session: &str) -> String {
        format!(
            r#"{{"event":"{event}","level":"info","timestamp":"2025-06-01T10:00:00Z","session_id":"{session}","pid":42,"project":"demo"}}"#
        )
    }

    #[test]
    fn test_parse_event_defaults() {
        let event = parse_event(r#"{"event":"citation"}"#).unwrap();
        assert_eq!(event.event, "citation");
        assert_eq!(event.level, "info");
        assert_eq!(event.pid, 0);
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(parse_event("").is_none());
        assert!(parse_event("not json").is_none());
        assert!(parse_event("{truncated").is_none());
    }

    #[test]
    fn test_incremental_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        write_line(&path, &event_json("citation", "aaa"));
        assert_eq!(reader.load_buffer(), 1);

        write_line(&path, &event_json("error", "aaa"));
        assert_eq!(reader.load_buffer(), 1);
        assert_eq!(reader.buffer_size(), 2);
    }

    #[test]
    fn test_partial_line_not_consumed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        // A write caught mid-line: no trailing newline yet.
        let mut f = fs::File::create(&path).unwrap();
        write!(f, r#"{{"event":"cita"#).unwrap();
        assert_eq!(reader.load_buffer(), 0);

        // The rest of the line arrives; the whole event parses.
        write!(f, r#"tion"}}"#).unwrap();
        writeln!(f).unwrap();
        assert_eq!(reader.load_buffer(), 1);
        assert_eq!(reader.read_all()[0].event, "citation");
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        write_line(&path, "garbage");
        write_line(&path, &event_json("citation", "aaa"));
        assert_eq!(reader.load_buffer(), 1);
    }

    #[test]
    fn test_ring_buffer_bounded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 3);

        for i in 0..5 {
            write_line(&path, &event_json(&format!("e{i}"), "s"));
        }
        reader.load_buffer();
        assert_eq!(reader.buffer_size(), 3);
        assert_eq!(reader.read_all()[0].event, "e2");
    }

    #[test]
    fn test_rotation_detected_by_inode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        write_line(&path, &event_json("citation", "old"));
        assert_eq!(reader.load_buffer(), 1);

        // Rotate: current file renamed away, a fresh one appears.
        fs::rename(&path, temp.path().join("debug.log.1")).unwrap();
        write_line(&path, &event_json("session_start", "new"));
        assert_eq!(reader.load_buffer(), 1);

        let events = reader.read_all();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event, "session_start");
    }

    #[test]
    fn test_filters_conjunction() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        write_line(&path, &event_json("citation", "s1"));
        write_line(&path, &event_json("citation", "s2"));
        write_line(&path, &event_json("error", "s1"));

        assert_eq!(reader.filter(None, Some("s1"), None, None).len(), 2);
        assert_eq!(
            reader
                .filter(Some("DEMO"), Some("s1"), Some("citation"), None)
                .len(),
            1
        );
        assert_eq!(reader.filter(Some("other"), None, None, None).len(), 0);
    }

    #[test]
    fn test_sessions_most_recent_first() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");
        let mut reader = LogReader::with_path(path.clone(), 100);

        write_line(&path, &event_json("citation", "first"));
        write_line(&path, &event_json("citation", "second"));
        write_line(&path, &event_json("citation", "first"));

        assert_eq!(reader.sessions(), vec!["first", "second"]);
    }

    #[test]
    fn test_format_event_line_plain() {
        let event = parse_event(
            r#"{"event":"citation","level":"info","timestamp":"2025-06-01T10:00:00Z","session_id":"s","pid":1,"project":"demo","lesson_id":"L001","uses_before":3,"uses_after":4}"#,
        )
        .unwrap();
        let line = format_event_line(&event, false);
        assert!(line.contains("citation"));
        assert!(line.contains("L001 (3→4)"));
    }
}
