//! Event output for external integrations.
//!
//! Events are emitted as JSON lines to stdout or a configured file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::rollup::RollUpReport;

pub const EVENT_SCHEMA_VERSION: &str = "glaura.event.v1";

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// Event kinds emitted by glaura.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskCompleted,
    TaskDeleted,
    HeaderCreated,
    HeaderDeleted,
    HeaderStatusChanged,
    ServiceStatusChanged,
    RollupWarning,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    /// Build a new event with an optional payload.
    pub fn new(event: EventKind, actor: Option<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            actor,
            data: None,
        }
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Events describing the status writes and warnings of a roll-up.
pub fn rollup_events(report: &RollUpReport, actor: Option<&str>) -> Result<Vec<Event>> {
    let actor = actor.map(str::to_string);
    let mut events = Vec::new();
    for header in report.headers.iter().filter(|h| h.written) {
        events.push(Event::new(EventKind::HeaderStatusChanged, actor.clone()).with_data(header)?);
    }
    if let Some(service) = report.service.as_ref().filter(|s| s.written) {
        events.push(Event::new(EventKind::ServiceStatusChanged, actor.clone()).with_data(service)?);
    }
    for warning in &report.warnings {
        events.push(Event::new(EventKind::RollupWarning, actor.clone()).with_data(warning)?);
    }
    Ok(events)
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    pub fn emit_all(&mut self, events: &[Event]) -> Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::evaluate::Transition;
    use crate::rollup::report::{HeaderRollUp, RollUpStep, RollUpWarning};

    #[test]
    fn only_written_changes_become_events() {
        let report = RollUpReport {
            headers: vec![
                HeaderRollUp {
                    header_id: "h1".to_string(),
                    task_count: 1,
                    previous_complete: false,
                    target_complete: true,
                    transition: Transition::Complete,
                    written: true,
                },
                HeaderRollUp {
                    header_id: "h2".to_string(),
                    task_count: 2,
                    previous_complete: false,
                    target_complete: false,
                    transition: Transition::None,
                    written: false,
                },
            ],
            service: None,
            warnings: vec![RollUpWarning::new(
                RollUpStep::ListServices,
                "J1-S1",
                &Error::Transient("reset".to_string()),
            )],
        };

        let events = rollup_events(&report, Some("ops")).expect("events");
        let kinds: Vec<EventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![EventKind::HeaderStatusChanged, EventKind::RollupWarning]
        );
        assert_eq!(events[0].data.as_ref().expect("data")["header_id"], "h1");
    }

    #[test]
    fn sink_appends_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        let mut sink = EventSink::file(&path).expect("sink");
        sink.emit(&Event::new(EventKind::TaskCompleted, None)).expect("emit");
        sink.emit(&Event::new(EventKind::TaskDeleted, None)).expect("emit");

        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "task_completed");
        assert_eq!(first["schema_version"], EVENT_SCHEMA_VERSION);
    }
}
