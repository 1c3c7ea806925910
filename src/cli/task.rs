//! kb task command implementations.
//!
//! Every write goes through the board controller: `add` through the add-task
//! modal, `move` through a drag, `edit` through an edit session.

use serde::Serialize;

use crate::board::{BoardController, DragOutcome, SubmitOutcome};
use crate::cli::{load_context, rejected_warnings, GlobalOptions};
use crate::error::{Error, Result};
use crate::log::EventLog;
use crate::output::{emit_success, HumanOutput};
use crate::projection::TaskQuery;
use crate::reconcile::{DropTarget, SiblingShift};
use crate::task::{Column, TaskRow};

pub struct AddOptions {
    pub column: String,
    pub title: String,
    pub description: Option<String>,
}

pub struct ListOptions {
    pub column: Option<String>,
}

pub struct ShowOptions {
    pub id: String,
}

pub struct MoveOptions {
    pub id: String,
    pub to: Option<String>,
    pub onto: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

pub struct DeleteOptions {
    pub id: String,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<TaskRow>,
}

#[derive(Serialize)]
struct MoveOutput {
    task: TaskRow,
    changed: bool,
    from_column: Column,
    from_position: u32,
    sibling_shifts: Vec<SiblingShift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_id: Option<String>,
}

#[derive(Serialize)]
struct DeleteOutput {
    id: String,
    title: String,
    column: Column,
}

pub fn run_add(options: AddOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(&global)?;
    let column: Column = options.column.parse()?;

    ctx.board.open_add_task(column);
    ctx.board.set_add_task_title(options.title);
    if let Some(description) = options.description {
        ctx.board.set_add_task_description(description);
    }
    let (id, report) = match ctx.board.submit_add_task()? {
        SubmitOutcome::Created { id, report } => (id, report),
        SubmitOutcome::Rejected | SubmitOutcome::Closed => {
            ctx.board.cancel_add_task();
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
    };

    let task = existing(&ctx.board, &id)?;
    let mut human = HumanOutput::new("Task created");
    if let Some(warning) = ctx.emit_events(&report.events) {
        human.push_warning(warning);
    }
    for warning in rejected_warnings(&ctx.board) {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Column", task.column.title());
    human.push_summary("Position", task.position.to_string());

    emit_success(ctx.output(&global), "add", &task, Some(&human))
}

pub fn run_list(options: ListOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let filter = options
        .column
        .as_deref()
        .map(str::parse::<Column>)
        .transpose()?;

    let query = filter.map_or(TaskQuery::All, TaskQuery::Column);
    let tasks = ctx.board.store().tasks(&query);
    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", output.total.to_string());
    for warning in rejected_warnings(&ctx.board) {
        human.push_warning(warning);
    }
    for line in board_lines(&ctx.board, filter) {
        human.push_detail(line);
    }

    emit_success(ctx.output(&global), "list", &output, Some(&human))
}

pub fn run_show(options: ShowOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let id = resolve_task_id(&ctx.board, &options.id)?;
    let task = existing(&ctx.board, &id)?;

    let mut human = HumanOutput::new(task.title.clone());
    human.push_summary("ID", task.id.clone());
    human.push_summary("Column", task.column.title());
    human.push_summary("Position", task.position.to_string());
    human.push_summary("Created", task.created_at.to_rfc3339());
    human.push_summary("Updated", task.updated_at.to_rfc3339());
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }

    emit_success(ctx.output(&global), "show", &task, Some(&human))
}

pub fn run_move(options: MoveOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(&global)?;
    let id = resolve_task_id(&ctx.board, &options.id)?;
    let target = match (options.to, options.onto) {
        (Some(column), None) => DropTarget::Column(column.parse()?),
        (None, Some(over)) => DropTarget::Task(
            resolve_task_id(&ctx.board, &over)
                .map_err(|_| Error::UnknownDropTarget(over.clone()))?,
        ),
        _ => {
            return Err(Error::InvalidArgument(
                "exactly one of --to or --onto is required".to_string(),
            ))
        }
    };

    ctx.board.drag_start(id.clone());
    let outcome = ctx.board.drag_end(Some(target))?;

    let (plan, batch_id, events) = match outcome {
        DragOutcome::Moved { plan, report } => (plan, report.batch_id, report.events),
        DragOutcome::Unchanged { plan } => (plan, None, Vec::new()),
        DragOutcome::Cancelled | DragOutcome::NotDragging => {
            return Err(Error::OperationFailed("drag did not complete".to_string()))
        }
    };

    let task = existing(&ctx.board, &id)?;
    let changed = batch_id.is_some();
    let header = if changed {
        format!("Task moved to {}", task.column.title())
    } else {
        "Task already in place".to_string()
    };
    let mut human = HumanOutput::new(header);
    if let Some(warning) = ctx.emit_events(&events) {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary(
        "From",
        format!("{}[{}]", plan.from_column, plan.from_position),
    );
    human.push_summary("To", format!("{}[{}]", task.column, task.position));
    if !plan.sibling_shifts.is_empty() {
        human.push_summary("Shifted", plan.sibling_shifts.len().to_string());
    }

    let output = MoveOutput {
        task,
        changed,
        from_column: plan.from_column,
        from_position: plan.from_position,
        sibling_shifts: plan.sibling_shifts,
        batch_id,
    };
    emit_success(ctx.output(&global), "move", &output, Some(&human))
}

pub fn run_edit(options: EditOptions, global: GlobalOptions) -> Result<()> {
    if options.title.is_none() && options.description.is_none() {
        return Err(Error::InvalidArgument(
            "nothing to edit; pass --title and/or --description".to_string(),
        ));
    }
    if let Some(title) = options.title.as_deref() {
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
    }

    let mut ctx = load_context(&global)?;
    let id = resolve_task_id(&ctx.board, &options.id)?;

    ctx.board.begin_edit(&id)?;
    ctx.board
        .edit_draft(&id, options.title.map(|t| t.trim().to_string()), options.description)?;
    let report = ctx.board.save_edit(&id)?;

    let task = existing(&ctx.board, &id)?;
    let mut human = HumanOutput::new("Task updated");
    if let Some(warning) = ctx.emit_events(&report.events) {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    emit_success(ctx.output(&global), "edit", &task, Some(&human))
}

pub fn run_delete(options: DeleteOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(&global)?;
    let id = resolve_task_id(&ctx.board, &options.id)?;
    let task = existing(&ctx.board, &id)?;

    let report = ctx.board.delete_task(&id)?;

    let mut human = HumanOutput::new("Task deleted");
    if let Some(warning) = ctx.emit_events(&report.events) {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    let output = DeleteOutput {
        id: task.id,
        title: task.title,
        column: task.column,
    };
    emit_success(ctx.output(&global), "delete", &output, Some(&human))
}

/// Render the board column by column, for `list` and `watch`.
pub(crate) fn board_lines<L: EventLog>(
    board: &BoardController<L>,
    only: Option<Column>,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (column, rows) in board.store().columns() {
        if only.is_some_and(|only| only != column) {
            continue;
        }
        lines.push(format!("{} ({})", column.title(), rows.len()));
        for row in rows {
            lines.push(format!("  [{}] {} {}", row.position, short_id(&row.id), row.title));
        }
    }
    lines
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Accept a full id or a unique prefix of one.
pub(crate) fn resolve_task_id<L: EventLog>(
    board: &BoardController<L>,
    input: &str,
) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if board.store().task(input).is_some() {
        return Ok(input.to_string());
    }

    let matches: Vec<TaskRow> = board
        .store()
        .tasks(&TaskQuery::All)
        .into_iter()
        .filter(|row| row.id.starts_with(input))
        .collect();
    match matches.as_slice() {
        [row] => Ok(row.id.clone()),
        [] => Err(Error::TaskNotFound(input.to_string())),
        _ => Err(Error::InvalidArgument(format!(
            "task id prefix '{input}' is ambiguous ({} matches)",
            matches.len()
        ))),
    }
}

fn existing<L: EventLog>(board: &BoardController<L>, id: &str) -> Result<TaskRow> {
    board
        .store()
        .task(id)
        .cloned()
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))
}
