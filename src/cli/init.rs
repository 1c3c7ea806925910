//! kb init command implementation
//!
//! Creates the board directory, an empty event log, and a default config.

use std::path::{Path, PathBuf};

use crate::cli::{resolve_start, GlobalOptions};
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{Storage, CONFIG_FILE};

#[derive(serde::Serialize)]
struct InitReport {
    board: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    board_dir: bool,
}

pub fn run(global: GlobalOptions) -> Result<()> {
    let root = resolve_start(global.board.as_ref())?;
    std::fs::create_dir_all(&root)?;

    let storage = Storage::new(root.clone());
    let created_board_dir = storage.init()?;
    let created_config = ensure_config(&root)?;

    let report = InitReport {
        board: root.clone(),
        created: InitCreated {
            config: created_config,
            board_dir: created_board_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE);
    }
    if created_board_dir {
        created_items.push(".kanban/");
    }

    let header = if created_items.is_empty() {
        "kb init: nothing to do".to_string()
    } else {
        "kb init: initialized board".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("board", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("kb add todo \"<title>\"");

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        "init",
        &report,
        Some(&human),
    )
}

fn ensure_config(root: &Path) -> Result<bool> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    Config::default().save(&path)?;
    Ok(true)
}
