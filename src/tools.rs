//! Capability tools: a fixed set of named board operations for agents.
//!
//! Each tool is described by a JSON schema and dispatched against a
//! [`BoardController`], so agent writes go through the same event contracts
//! as the drag and edit paths. Tool failures are results, not errors: the
//! caller always gets text back, flagged with `is_error`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::board::{BoardController, DragOutcome, SubmitOutcome};
use crate::error::{Error, Result};
use crate::log::EventLog;
use crate::projection::TaskQuery;
use crate::reconcile::DropTarget;
use crate::task::{BoardEvent, Column};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: format!("Error: {}", text.into()),
            is_error: true,
        }
    }
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "tool", content = "args")]
pub enum ToolCall {
    #[serde(rename = "createTask")]
    CreateTask {
        title: String,
        #[serde(default)]
        description: String,
        column: Column,
    },
    #[serde(rename = "listTasks")]
    ListTasks {
        #[serde(default)]
        column: Option<Column>,
    },
    #[serde(rename = "moveTask")]
    MoveTask {
        #[serde(rename = "taskId")]
        task_id: String,
        column: Column,
    },
    #[serde(rename = "updateTask")]
    UpdateTask {
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "deleteTask")]
    DeleteTask {
        #[serde(rename = "taskId")]
        task_id: String,
    },
}

pub const TOOL_NAMES: [&str; 5] = [
    "createTask",
    "listTasks",
    "moveTask",
    "updateTask",
    "deleteTask",
];

impl ToolCall {
    /// Build a call from a tool name and its JSON arguments.
    pub fn parse(name: &str, args: Value) -> Result<Self> {
        if !TOOL_NAMES.contains(&name) {
            return Err(Error::InvalidArgument(format!(
                "unknown tool '{name}' (expected one of: {})",
                TOOL_NAMES.join(", ")
            )));
        }
        let args = if args.is_null() { json!({}) } else { args };
        serde_json::from_value(json!({ "tool": name, "args": args }))
            .map_err(|err| Error::InvalidArgument(format!("invalid arguments for {name}: {err}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "createTask",
            Self::ListTasks { .. } => "listTasks",
            Self::MoveTask { .. } => "moveTask",
            Self::UpdateTask { .. } => "updateTask",
            Self::DeleteTask { .. } => "deleteTask",
        }
    }
}

fn column_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "enum": ["todo", "doing", "done"],
        "description": description,
    })
}

fn task_id_schema(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "createTask",
            description: "Create a new task on the Kanban board with a title, description, and column (todo/doing/done)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "The title of the task" },
                    "description": { "type": "string", "description": "A detailed description of the task" },
                    "column": column_schema("The column to place the task in"),
                },
                "required": ["title", "description", "column"],
            }),
        },
        ToolDescriptor {
            name: "listTasks",
            description: "List all tasks on the Kanban board, optionally filtered by column",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "column": column_schema("Filter tasks by column (optional)"),
                },
            }),
        },
        ToolDescriptor {
            name: "moveTask",
            description: "Move a task to a different column on the Kanban board",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": task_id_schema("The ID of the task to move"),
                    "column": column_schema("The destination column"),
                },
                "required": ["taskId", "column"],
            }),
        },
        ToolDescriptor {
            name: "updateTask",
            description: "Update the title or description of an existing task",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": task_id_schema("The ID of the task to update"),
                    "title": { "type": "string", "description": "New title for the task (optional)" },
                    "description": { "type": "string", "description": "New description for the task (optional)" },
                },
                "required": ["taskId"],
            }),
        },
        ToolDescriptor {
            name: "deleteTask",
            description: "Delete a task from the Kanban board",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "taskId": task_id_schema("The ID of the task to delete"),
                },
                "required": ["taskId"],
            }),
        },
    ]
}

/// Run a tool call. Store failures (IO, lock) are still errors; everything
/// the caller can fix comes back as an error result.
pub fn dispatch<L: EventLog>(board: &mut BoardController<L>, call: ToolCall) -> Result<ToolOutput> {
    tracing::debug!(tool = call.name(), "dispatching tool call");
    match call {
        ToolCall::CreateTask {
            title,
            description,
            column,
        } => match board.create_task(column, &title, description)? {
            SubmitOutcome::Created { id, .. } => Ok(ToolOutput::ok(format!(
                "Created task \"{}\" in {column} column with ID: {id}",
                title.trim()
            ))),
            _ => Ok(ToolOutput::error("Title cannot be empty")),
        },
        ToolCall::ListTasks { column } => {
            let query = column.map_or(TaskQuery::All, TaskQuery::Column);
            let rows = board.store().tasks(&query);
            if rows.is_empty() {
                return Ok(ToolOutput::ok(match column {
                    Some(column) => format!("No tasks in {column} column"),
                    None => "No tasks on the board".to_string(),
                }));
            }
            let lines: Vec<String> = rows
                .iter()
                .map(|row| {
                    format!(
                        "- [{}] {}: {} (ID: {})",
                        row.column, row.title, row.description, row.id
                    )
                })
                .collect();
            Ok(ToolOutput::ok(format!("Tasks:\n{}", lines.join("\n"))))
        }
        ToolCall::MoveTask { task_id, column } => {
            let title = match board.store().task(&task_id) {
                Some(row) => row.title.clone(),
                None => return Ok(not_found(&task_id)),
            };
            match board.move_task(&task_id, DropTarget::Column(column))? {
                DragOutcome::Unchanged { .. } => Ok(ToolOutput::ok(format!(
                    "Task \"{title}\" is already in {column} column"
                ))),
                _ => Ok(ToolOutput::ok(format!(
                    "Moved task \"{title}\" to {column} column"
                ))),
            }
        }
        ToolCall::UpdateTask {
            task_id,
            title,
            description,
        } => {
            if board.store().task(&task_id).is_none() {
                return Ok(not_found(&task_id));
            }
            let title = title
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            let description = description.filter(|value| !value.trim().is_empty());
            if title.is_none() && description.is_none() {
                return Ok(ToolOutput::error(
                    "Must provide at least one of title or description to update",
                ));
            }

            let mut updated = Vec::new();
            if title.is_some() {
                updated.push("title");
            }
            if description.is_some() {
                updated.push("description");
            }
            board.store_mut().commit(vec![BoardEvent::task_updated(
                task_id.clone(),
                title,
                description,
                Utc::now(),
            )])?;
            Ok(ToolOutput::ok(format!(
                "Updated {} for task {task_id}",
                updated.join(" and ")
            )))
        }
        ToolCall::DeleteTask { task_id } => {
            let title = match board.store().task(&task_id) {
                Some(row) => row.title.clone(),
                None => return Ok(not_found(&task_id)),
            };
            board.delete_task(&task_id)?;
            Ok(ToolOutput::ok(format!("Deleted task \"{title}\"")))
        }
    }
}

fn not_found(task_id: &str) -> ToolOutput {
    ToolOutput::error(format!("Task with ID {task_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::reconcile::ReorderPolicy;
    use crate::store::TaskStore;

    fn board() -> (BoardController<MemoryLog>, MemoryLog) {
        let log = MemoryLog::new();
        let store = TaskStore::open(log.clone(), Some("agent".to_string())).expect("open");
        (BoardController::new(store, ReorderPolicy::Compact), log)
    }

    fn call(board: &mut BoardController<MemoryLog>, name: &str, args: Value) -> ToolOutput {
        let call = ToolCall::parse(name, args).expect("parse");
        dispatch(board, call).expect("dispatch")
    }

    fn created_id(output: &ToolOutput) -> String {
        output
            .text
            .rsplit("ID: ")
            .next()
            .expect("id suffix")
            .to_string()
    }

    #[test]
    fn descriptors_cover_every_tool() {
        let names: Vec<&str> = descriptors().iter().map(|tool| tool.name).collect();
        assert_eq!(names, TOOL_NAMES);
        for tool in descriptors() {
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn parse_rejects_unknown_tool_and_bad_args() {
        let err = ToolCall::parse("archiveTask", json!({})).expect_err("unknown");
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = ToolCall::parse("moveTask", json!({ "taskId": "a", "column": "later" }))
            .expect_err("bad column");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn list_tasks_accepts_null_args() {
        let call = ToolCall::parse("listTasks", Value::Null).expect("parse");
        assert_eq!(call, ToolCall::ListTasks { column: None });
    }

    #[test]
    fn create_then_list() {
        let (mut board, _) = board();
        let output = call(
            &mut board,
            "createTask",
            json!({ "title": "Write docs", "description": "README", "column": "doing" }),
        );
        assert!(!output.is_error);
        let id = created_id(&output);
        assert_eq!(board.store().task(&id).expect("row").position, 0);

        let listed = call(&mut board, "listTasks", json!({ "column": "doing" }));
        assert_eq!(
            listed.text,
            format!("Tasks:\n- [doing] Write docs: README (ID: {id})")
        );

        let empty = call(&mut board, "listTasks", json!({ "column": "done" }));
        assert_eq!(empty.text, "No tasks in done column");
    }

    #[test]
    fn move_goes_through_reconciler() {
        let (mut board, _) = board();
        let a = created_id(&call(
            &mut board,
            "createTask",
            json!({ "title": "A", "description": "", "column": "todo" }),
        ));
        let b = created_id(&call(
            &mut board,
            "createTask",
            json!({ "title": "B", "description": "", "column": "todo" }),
        ));

        let output = call(&mut board, "moveTask", json!({ "taskId": a, "column": "done" }));
        assert_eq!(output.text, "Moved task \"A\" to done column");
        assert_eq!(board.store().task(&a).expect("a").column, Column::Done);
        assert_eq!(board.store().task(&b).expect("b").position, 0);
    }

    #[test]
    fn unknown_ids_return_error_results_without_events() {
        let (mut board, log) = board();
        for (name, args) in [
            ("moveTask", json!({ "taskId": "ghost", "column": "done" })),
            ("updateTask", json!({ "taskId": "ghost", "title": "x" })),
            ("deleteTask", json!({ "taskId": "ghost" })),
        ] {
            let output = call(&mut board, name, args);
            assert!(output.is_error, "{name}");
            assert_eq!(output.text, "Error: Task with ID ghost not found");
        }
        assert!(log.is_empty().expect("empty"));
    }

    #[test]
    fn update_requires_a_field_and_keeps_the_other() {
        let (mut board, log) = board();
        let id = created_id(&call(
            &mut board,
            "createTask",
            json!({ "title": "A", "description": "keep me", "column": "todo" }),
        ));

        let output = call(&mut board, "updateTask", json!({ "taskId": id }));
        assert!(output.is_error);
        assert_eq!(log.len().expect("len"), 1);

        let output = call(&mut board, "updateTask", json!({ "taskId": id, "title": "B" }));
        assert_eq!(output.text, format!("Updated title for task {id}"));
        let row = board.store().task(&id).expect("row");
        assert_eq!(row.title, "B");
        assert_eq!(row.description, "keep me");
    }

    #[test]
    fn create_trims_title_and_rejects_blank() {
        let (mut board, log) = board();
        let output = call(
            &mut board,
            "createTask",
            json!({ "title": "   ", "description": "", "column": "todo" }),
        );
        assert!(output.is_error);
        assert_eq!(output.text, "Error: Title cannot be empty");
        assert!(log.is_empty().expect("empty"));

        let output = call(
            &mut board,
            "createTask",
            json!({ "title": "  padded  ", "description": "", "column": "todo" }),
        );
        assert!(output.text.starts_with("Created task \"padded\" in todo column"));
        let id = created_id(&output);
        assert_eq!(board.store().task(&id).expect("row").title, "padded");
    }

    #[test]
    fn update_ignores_blank_title() {
        let (mut board, log) = board();
        let id = created_id(&call(
            &mut board,
            "createTask",
            json!({ "title": "A", "description": "", "column": "todo" }),
        ));

        let output = call(&mut board, "updateTask", json!({ "taskId": id, "title": "   " }));
        assert!(output.is_error);
        assert_eq!(log.len().expect("len"), 1);

        let output = call(
            &mut board,
            "updateTask",
            json!({ "taskId": id, "title": "   ", "description": "notes" }),
        );
        assert_eq!(output.text, format!("Updated description for task {id}"));
        let row = board.store().task(&id).expect("row");
        assert_eq!(row.title, "A");
        assert_eq!(row.description, "notes");
    }

    #[test]
    fn delete_reports_title() {
        let (mut board, _) = board();
        let id = created_id(&call(
            &mut board,
            "createTask",
            json!({ "title": "Gone", "description": "", "column": "todo" }),
        ));
        let output = call(&mut board, "deleteTask", json!({ "taskId": id }));
        assert_eq!(output.text, "Deleted task \"Gone\"");
        assert!(board.store().task(&id).is_none());
    }
}
