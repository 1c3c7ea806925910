//! Board projection: current rows derived from the event log.
//!
//! Materialization is deterministic. Given the same events in the same order,
//! [`BoardState::replay`] always produces an equal state.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{BoardEvent, ChatMessage, Column, StoredEvent, TaskRow};

const BOARD_SCHEMA_VERSION: &str = "kb.board.v1";

/// What a single materialization did to the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Inserted,
    Updated,
    Removed,
    /// Event targeted a row that does not exist; nothing changed.
    Missing,
}

/// Read query over task rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskQuery {
    /// Every task, ordered by column then position.
    All,
    /// Tasks in one column, ordered by position ascending.
    Column(Column),
    /// A single task by id.
    Id(String),
}

/// Tasks grouped per column, each list ordered by position.
pub type Columns = BTreeMap<Column, Vec<TaskRow>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    tasks: HashMap<String, TaskRow>,
    chat_messages: Vec<ChatMessage>,
    chat_session: Option<String>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a projection from empty by applying `events` in order.
    pub fn replay<'a, I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a StoredEvent>,
    {
        let mut state = Self::new();
        for stored in events {
            state.apply(&stored.event)?;
        }
        Ok(state)
    }

    pub fn apply(&mut self, event: &BoardEvent) -> Result<Materialized> {
        let outcome = match event {
            BoardEvent::TaskCreated {
                id,
                title,
                description,
                column,
                position,
                created_at,
            } => {
                if self.tasks.contains_key(id) {
                    return Err(Error::DuplicateTask(id.clone()));
                }
                self.tasks.insert(
                    id.clone(),
                    TaskRow {
                        id: id.clone(),
                        title: title.clone(),
                        description: description.clone(),
                        column: *column,
                        position: *position,
                        created_at: *created_at,
                        updated_at: *created_at,
                    },
                );
                Materialized::Inserted
            }
            BoardEvent::TaskMoved {
                id,
                column,
                position,
                updated_at,
            } => match self.tasks.get_mut(id) {
                Some(row) => {
                    row.column = *column;
                    row.position = *position;
                    touch(row, *updated_at);
                    Materialized::Updated
                }
                None => Materialized::Missing,
            },
            BoardEvent::TaskUpdated {
                id,
                title,
                description,
                updated_at,
            } => match self.tasks.get_mut(id) {
                Some(row) => {
                    if let Some(title) = title {
                        row.title = title.clone();
                    }
                    if let Some(description) = description {
                        row.description = description.clone();
                    }
                    touch(row, *updated_at);
                    Materialized::Updated
                }
                None => Materialized::Missing,
            },
            BoardEvent::TaskDeleted { id } => match self.tasks.remove(id) {
                Some(_) => Materialized::Removed,
                None => Materialized::Missing,
            },
            BoardEvent::ChatMessageSent {
                id,
                content,
                role,
                created_at,
            } => {
                if self.chat_messages.iter().any(|message| &message.id == id) {
                    return Err(Error::DuplicateMessage(id.clone()));
                }
                let message = ChatMessage {
                    id: id.clone(),
                    content: content.clone(),
                    role: *role,
                    created_at: *created_at,
                };
                // Stable insert keeps log order for equal timestamps.
                let index = self
                    .chat_messages
                    .partition_point(|existing| existing.created_at <= message.created_at);
                self.chat_messages.insert(index, message);
                Materialized::Inserted
            }
            BoardEvent::ChatSessionUpdated { session_id } => {
                let outcome = if self.chat_session.is_some() {
                    Materialized::Updated
                } else {
                    Materialized::Inserted
                };
                self.chat_session = Some(session_id.clone());
                outcome
            }
        };

        tracing::debug!(event = event.name(), ?outcome, "materialized");
        Ok(outcome)
    }

    pub fn task(&self, id: &str) -> Option<&TaskRow> {
        self.tasks.get(id)
    }

    pub fn contains_task(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self, query: &TaskQuery) -> Vec<TaskRow> {
        let mut rows: Vec<TaskRow> = match query {
            TaskQuery::All => self.tasks.values().cloned().collect(),
            TaskQuery::Column(column) => self
                .tasks
                .values()
                .filter(|row| row.column == *column)
                .cloned()
                .collect(),
            TaskQuery::Id(id) => self.tasks.get(id).cloned().into_iter().collect(),
        };
        sort_rows(&mut rows);
        rows
    }

    /// Every column (including empty ones) with its ordered task list.
    pub fn columns(&self) -> Columns {
        let mut columns: Columns = Column::ALL.iter().map(|c| (*c, Vec::new())).collect();
        for row in self.tasks.values() {
            columns.entry(row.column).or_default().push(row.clone());
        }
        for rows in columns.values_mut() {
            sort_rows(rows);
        }
        columns
    }

    /// Slot for a task appended to `column`.
    pub fn next_position(&self, column: Column) -> u32 {
        self.tasks
            .values()
            .filter(|row| row.column == column)
            .map(|row| row.position + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn chat_messages(&self) -> &[ChatMessage] {
        &self.chat_messages
    }

    pub fn chat_session(&self) -> Option<&str> {
        self.chat_session.as_deref()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            schema_version: BOARD_SCHEMA_VERSION.to_string(),
            store_id: None,
            generated_at: Utc::now(),
            tasks: self.tasks(&TaskQuery::All),
            chat_messages: self.chat_messages.clone(),
            chat_session: self.chat_session.clone(),
        }
    }
}

/// Serializable copy of the projection, written by `kb sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub schema_version: String,
    /// `[board] store_id` of the board the snapshot was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<TaskRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_session: Option<String>,
}

fn touch(row: &mut TaskRow, updated_at: DateTime<Utc>) {
    row.updated_at = row.updated_at.max(updated_at).max(row.created_at);
}

fn sort_rows(rows: &mut [TaskRow]) {
    rows.sort_by(|a, b| {
        a.column
            .cmp(&b.column)
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.id.cmp(&b.id))
    });
}
