/// Reproducibility logging system
///
/// Every operator event a session applies is recorded with:
/// - Timestamp
/// - Operation name and description
/// - The event itself, as JSON
/// - Sequential order
///
/// The log can be exported as:
/// - Human-readable text
/// - JSON
/// - Replay script (JSON array of events) for the headless digitizer

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::pipeline::event::OperatorEvent;

/// A single log entry representing one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequential operation number (1-based)
    pub sequence: usize,
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub description: String,
    /// Replayable event; `None` for entries like image loading that come
    /// from outside the event stream
    #[serde(default)]
    pub event: Option<OperatorEvent>,
}

impl LogEntry {
    /// Format as human-readable text line
    pub fn to_text(&self) -> String {
        let event = match &self.event {
            Some(event) => serde_json::to_string(event).unwrap_or_else(|e| format!("(unserializable: {})", e)),
            None => "(n/a)".to_string(),
        };
        format!(
            "[{:03}] {} | {} | {}\n      Event: {}",
            self.sequence,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.operation,
            self.description,
            event
        )
    }
}

/// The reproducibility log, all operations in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproLog {
    pub session_id: String,
    pub session_start: DateTime<Local>,
    pub source_file: String,
    pub software_version: String,
    pub entries: Vec<LogEntry>,
}

impl ReproLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_start: Local::now(),
            source_file: String::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: &str) {
        self.source_file = source.to_string();
    }

    /// Record an applied operator event
    pub fn add_event(&mut self, event: &OperatorEvent) {
        self.push(event.name(), &event.to_string(), Some(event.clone()));
    }

    /// Record a non-replayable note
    pub fn add_note(&mut self, operation: &str, description: &str) {
        self.push(operation, description, None);
    }

    fn push(&mut self, operation: &str, description: &str, event: Option<OperatorEvent>) {
        let seq = self.entries.len() + 1;
        self.entries.push(LogEntry {
            sequence: seq,
            timestamp: Local::now(),
            operation: operation.to_string(),
            description: description.to_string(),
            event,
        });
        log::info!("[LOG {:03}] {}: {}", seq, operation, description);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replayable events in order
    pub fn events(&self) -> Vec<OperatorEvent> {
        self.entries.iter().filter_map(|e| e.event.clone()).collect()
    }

    /// Export as human-readable text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str("  ECG Digitizer Reproducibility Log\n");
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str(&format!("  Session ID:  {}\n", self.session_id));
        out.push_str(&format!(
            "  Started:     {}\n",
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("  Source:      {}\n", self.source_file));
        out.push_str(&format!("  Software:    ecg_digitizer v{}\n", self.software_version));
        out.push_str(&format!("  Operations:  {}\n", self.entries.len()));
        out.push_str("───────────────────────────────────────────────────────────────\n\n");

        for entry in &self.entries {
            out.push_str(&entry.to_text());
            out.push_str("\n\n");
        }

        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str(&format!(
            "  Log exported: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// JSON array of events, readable by `ecg-digitize --script`
    pub fn to_replay_script(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events())
    }

    pub fn save_text(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_text())
    }

    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_json()?)
    }

    pub fn save_script(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_replay_script()?)
    }
}

impl Default for ReproLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::settings::SettingField;

    #[test]
    fn test_log_creation_and_entries() {
        let mut log = ReproLog::new();
        assert!(log.is_empty());

        log.add_event(&OperatorEvent::Crop);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].sequence, 1);
        assert_eq!(log.entries[0].operation, "Crop");

        log.add_note("Load Image", "strip.png");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries[1].sequence, 2);
        assert!(log.entries[1].event.is_none());
    }

    #[test]
    fn test_text_export() {
        let mut log = ReproLog::new();
        log.set_source("strip.png");
        log.add_event(&OperatorEvent::SetField {
            field: SettingField::Amplitude,
            text: "20".to_string(),
        });
        let text = log.to_text();
        assert!(text.contains("strip.png"));
        assert!(text.contains("Amplitude = \"20\""));
        assert!(text.contains(r#""event":"SetField""#));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut log = ReproLog::new();
        log.add_event(&OperatorEvent::Extract);
        let json = log.to_json().unwrap();
        let parsed: ReproLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].event, Some(OperatorEvent::Extract));
    }

    #[test]
    fn test_replay_script_skips_notes() {
        let mut log = ReproLog::new();
        log.add_note("Load Image", "a.png");
        log.add_event(&OperatorEvent::Crop);
        log.add_event(&OperatorEvent::Recompute);
        let script = log.to_replay_script().unwrap();
        let events: Vec<OperatorEvent> = serde_json::from_str(&script).unwrap();
        assert_eq!(events, vec![OperatorEvent::Crop, OperatorEvent::Recompute]);
    }
}
