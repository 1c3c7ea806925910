//! kb sync command implementation
//!
//! Replays the whole log twice from empty, checks both replays agree with
//! the live projection, and writes `.kanban/snapshot.json`.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{load_context, rejected_warnings, GlobalOptions};
use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::log::{EventLog, MemoryLog};
use crate::output::{emit_success, HumanOutput};
use crate::projection::{BoardState, Columns};
use crate::store::TaskStore;
use crate::task::{Column, StoredEvent};

#[derive(Serialize)]
struct SyncReport {
    store_id: String,
    events: usize,
    tasks: usize,
    chat_messages: usize,
    rejected: usize,
    deterministic: bool,
    /// Columns whose positions are not a dense 0..n-1
    #[serde(skip_serializing_if = "Vec::is_empty")]
    gapped_columns: Vec<Column>,
    snapshot: PathBuf,
}

pub fn run(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let events = ctx.board.store().events()?;

    let first = replay(&events)?;
    let second = replay(&events)?;
    if first != second {
        return Err(Error::OperationFailed(
            "replaying the log twice produced different boards".to_string(),
        ));
    }
    // The live store may have read fewer events if another session appended
    // meanwhile; only a full read is comparable.
    if ctx.board.store().cursor() == events.len() && &first != ctx.board.store().state() {
        return Err(Error::OperationFailed(
            "replayed board differs from the live projection".to_string(),
        ));
    }

    let snapshot_path = ctx.storage.snapshot_file();
    {
        let _lock = FileLock::acquire(
            ctx.storage.lock_file(&snapshot_path),
            DEFAULT_LOCK_TIMEOUT_MS,
        )?;
        let mut snapshot = first.snapshot();
        snapshot.store_id = Some(ctx.config.board.store_id.clone());
        ctx.storage.write_json(&snapshot_path, &snapshot)?;
    }

    let gapped_columns = gapped_columns(&first.columns());
    let report = SyncReport {
        store_id: ctx.config.board.store_id.clone(),
        events: events.len(),
        tasks: first.task_count(),
        chat_messages: first.chat_messages().len(),
        rejected: ctx.board.store().rejected().len(),
        deterministic: true,
        gapped_columns: gapped_columns.clone(),
        snapshot: snapshot_path.clone(),
    };

    tracing::info!(
        store_id = %report.store_id,
        events = report.events,
        tasks = report.tasks,
        "snapshot written"
    );

    let mut human = HumanOutput::new("kb sync: board verified");
    human.push_summary("Store", report.store_id.clone());
    human.push_summary("Events", report.events.to_string());
    human.push_summary("Tasks", report.tasks.to_string());
    human.push_summary("Snapshot", snapshot_path.display().to_string());
    for warning in rejected_warnings(&ctx.board) {
        human.push_warning(warning);
    }
    for column in &gapped_columns {
        human.push_warning(format!("column {column} has position gaps"));
    }

    emit_success(ctx.output(&global), "sync", &report, Some(&human))
}

fn replay(events: &[StoredEvent]) -> Result<BoardState> {
    let mut log = MemoryLog::new();
    log.append(events)?;
    let store = TaskStore::open(log, None)?;
    Ok(store.state().clone())
}

fn gapped_columns(columns: &Columns) -> Vec<Column> {
    columns
        .iter()
        .filter(|(_, rows)| {
            rows.iter()
                .enumerate()
                .any(|(index, row)| u32::try_from(index).map_or(true, |i| i != row.position))
        })
        .map(|(column, _)| *column)
        .collect()
}
