//! Event output for external integrations.
//!
//! Committed board events are mirrored as JSON lines to stdout or a file
//! (`kb --events <path|->`). The log itself is never read from here.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::task::{BoardEvent, StoredEvent};

pub const EVENT_SCHEMA_VERSION: &str = "kb.event.v1";

#[derive(Debug, Clone, PartialEq, Eq)]
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

/// One committed event as seen by integrations.
#[derive(Debug, Clone, Serialize)]
pub struct Event<'a> {
    pub schema_version: &'static str,
    pub event: &'static str,
    pub event_id: &'a str,
    pub batch_id: &'a str,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<&'a str>,
    pub data: &'a BoardEvent,
}

impl<'a> From<&'a StoredEvent> for Event<'a> {
    fn from(stored: &'a StoredEvent) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event: stored.event.name(),
            event_id: &stored.event_id,
            batch_id: &stored.batch_id,
            timestamp: stored.recorded_at,
            session: stored.session.as_deref(),
            data: &stored.event,
        }
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
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

    #[cfg(test)]
    fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    pub fn emit_all(&mut self, events: &[StoredEvent]) -> Result<()> {
        for stored in events {
            self.emit(&Event::from(stored))?;
        }
        Ok(())
    }
}
