//! kb watch command implementation
//!
//! Follows `.kanban/` with a filesystem watcher, pulls new events after a
//! quiet period, and reprints the board when a subscribed query changes.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;

use crate::cli::task::board_lines;
use crate::cli::{load_context, BoardContext, GlobalOptions};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::projection::TaskQuery;
use crate::task::TaskRow;

pub struct WatchOptions {
    pub max_updates: Option<usize>,
}

#[derive(Serialize)]
struct WatchUpdate {
    update: usize,
    total: usize,
    tasks: Vec<TaskRow>,
}

pub fn run(options: WatchOptions, global: GlobalOptions) -> Result<()> {
    let mut ctx = load_context(&global)?;
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);

    let changed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&changed);
    ctx.board
        .store_mut()
        .subscribe(TaskQuery::All, move |_rows| flag.set(true));

    let mut update = 0;
    if options.max_updates == Some(0) {
        return print_board(&ctx, &global, update);
    }

    // Watch before the first print so no append after it goes unseen.
    let (event_tx, event_rx) = mpsc::channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })?;
    watcher.watch(&ctx.storage.board_dir(), RecursiveMode::NonRecursive)?;
    tracing::info!(dir = %ctx.storage.board_dir().display(), "watching board");

    print_board(&ctx, &global, update)?;
    changed.set(false);

    let mut pending: Option<Instant> = None;
    loop {
        let timeout = pending
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));
        match event_rx.recv_timeout(timeout) {
            Ok(Ok(_)) => {
                pending = Some(Instant::now() + debounce);
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "watch error");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if pending.take().is_none() {
                    continue;
                }
                ctx.board.store_mut().pull()?;
                if !changed.replace(false) {
                    continue;
                }
                update += 1;
                print_board(&ctx, &global, update)?;
                if options.max_updates.is_some_and(|max| update >= max) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

fn print_board(ctx: &BoardContext, global: &GlobalOptions, update: usize) -> Result<()> {
    let tasks = ctx.board.store().tasks(&TaskQuery::All);
    let mut human = HumanOutput::new(format!("Board (update {update})"));
    human.push_summary("Total", tasks.len().to_string());
    for line in board_lines(&ctx.board, None) {
        human.push_detail(line);
    }

    let data = WatchUpdate {
        update,
        total: tasks.len(),
        tasks,
    };
    emit_success(ctx.output(global), "watch", &data, Some(&human))
}
