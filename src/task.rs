//! Task model for kb.
//!
//! Tasks are never written directly. Every change is a [`BoardEvent`] wrapped
//! in a [`StoredEvent`] envelope and appended to the board log
//! (`.kanban/events.jsonl`); rows are rebuilt from that log by the projection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// The fixed set of board columns, in display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Todo,
    Doing,
    Done,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::Todo, Column::Doing, Column::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Done => "done",
        }
    }

    /// Human-facing column heading.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::Doing => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            other => Err(Error::UnknownColumn(other.to_string())),
        }
    }
}

/// Materialized current state of one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub column: Column,
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::InvalidArgument(format!(
                "unknown chat role '{other}' (expected user|assistant)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: ChatRole,
    pub created_at: DateTime<Utc>,
}

/// Versioned board events. The `name` tag is part of the log format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "name")]
pub enum BoardEvent {
    #[serde(rename = "v1.TaskCreated")]
    TaskCreated {
        id: String,
        title: String,
        #[serde(default)]
        description: String,
        column: Column,
        position: u32,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "v1.TaskMoved")]
    TaskMoved {
        id: String,
        column: Column,
        position: u32,
        updated_at: DateTime<Utc>,
    },
    #[serde(rename = "v1.TaskUpdated")]
    TaskUpdated {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        updated_at: DateTime<Utc>,
    },
    #[serde(rename = "v1.TaskDeleted")]
    TaskDeleted { id: String },
    #[serde(rename = "v1.ChatMessageSent")]
    ChatMessageSent {
        id: String,
        content: String,
        role: ChatRole,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "v1.ChatSessionUpdated")]
    ChatSessionUpdated { session_id: String },
}

impl BoardEvent {
    pub fn task_created(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        column: Column,
        position: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::TaskCreated {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            column,
            position,
            created_at,
        }
    }

    pub fn task_moved(
        id: impl Into<String>,
        column: Column,
        position: u32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self::TaskMoved {
            id: id.into(),
            column,
            position,
            updated_at,
        }
    }

    pub fn task_updated(
        id: impl Into<String>,
        title: Option<String>,
        description: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self::TaskUpdated {
            id: id.into(),
            title,
            description,
            updated_at,
        }
    }

    pub fn task_deleted(id: impl Into<String>) -> Self {
        Self::TaskDeleted { id: id.into() }
    }

    /// Log name of the event, e.g. `v1.TaskMoved`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "v1.TaskCreated",
            Self::TaskMoved { .. } => "v1.TaskMoved",
            Self::TaskUpdated { .. } => "v1.TaskUpdated",
            Self::TaskDeleted { .. } => "v1.TaskDeleted",
            Self::ChatMessageSent { .. } => "v1.ChatMessageSent",
            Self::ChatSessionUpdated { .. } => "v1.ChatSessionUpdated",
        }
    }

    /// Id of the task this event touches, if it is a task event.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskCreated { id, .. }
            | Self::TaskMoved { id, .. }
            | Self::TaskUpdated { id, .. }
            | Self::TaskDeleted { id } => Some(id),
            Self::ChatMessageSent { .. } | Self::ChatSessionUpdated { .. } => None,
        }
    }
}

/// Envelope written to the log. All events of one commit share `batch_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredEvent {
    pub event_id: String,
    pub batch_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub event: BoardEvent,
}

impl StoredEvent {
    /// Wrap a batch of events into envelopes sharing one batch id.
    pub fn batch(events: Vec<BoardEvent>, session: Option<&str>) -> Vec<StoredEvent> {
        let batch_id = Ulid::new().to_string();
        let recorded_at = Utc::now();
        events
            .into_iter()
            .map(|event| StoredEvent {
                event_id: Ulid::new().to_string(),
                batch_id: batch_id.clone(),
                session: session.map(str::to_string),
                recorded_at,
                event,
            })
            .collect()
    }
}

/// Fresh opaque task id.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
