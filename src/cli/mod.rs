//! Command-line interface for kb
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::board::BoardController;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventDestination, EventSink};
use crate::log::JsonlLog;
use crate::store::TaskStore;
use crate::storage::Storage;
use crate::task::StoredEvent;

mod chat;
mod init;
mod sync;
mod task;
mod tool;
mod watch;

/// kb - event-sourced Kanban board
///
/// Tasks live in three columns (todo, doing, done). Every change is an
/// event appended to `.kanban/events.jsonl`; the board is rebuilt from it.
#[derive(Parser, Debug)]
#[command(name = "kb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Board root (defaults to the nearest directory containing .kanban/)
    #[arg(long, global = true, env = "KB_BOARD")]
    pub board: Option<PathBuf>,

    /// Session name stamped on appended events
    #[arg(long, global = true, env = "KB_SESSION")]
    pub session: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Mirror committed events as JSON lines to a file, or '-' for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .kanban/ and a default .kanban.toml
    Init,

    /// Add a task at the end of a column
    Add {
        /// Column: todo, doing, done
        column: String,

        /// Task title
        title: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List tasks in board order
    List {
        /// Only this column
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Show one task
    Show {
        id: String,
    },

    /// Drag a task onto a column or another task
    Move {
        id: String,

        /// Drop on the empty area of a column (append at the end)
        #[arg(long, conflicts_with = "onto", required_unless_present = "onto")]
        to: Option<String>,

        /// Drop on another task card
        #[arg(long)]
        onto: Option<String>,
    },

    /// Edit a task's title or description
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,
    },

    /// Replay the log, verify it, and write .kanban/snapshot.json
    Sync,

    /// Follow the log and print the board whenever it changes
    Watch {
        /// Exit after this many refreshes
        #[arg(long)]
        max_updates: Option<usize>,
    },

    /// Agent capability tools
    #[command(subcommand)]
    Tool(ToolCommands),

    /// Board chat log
    #[command(subcommand)]
    Chat(ChatCommands),
}

#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// List tool names and input schemas
    List,

    /// Invoke a tool
    Call {
        /// Tool name, e.g. createTask
        name: String,

        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChatCommands {
    /// Append a chat message
    Send {
        text: String,

        /// user or assistant
        #[arg(long, default_value = "user")]
        role: String,
    },

    /// Print chat messages in order
    History,

    /// Set the current chat session token
    Session {
        session_id: String,
    },
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub board: Option<PathBuf>,
    pub session: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub events: Option<String>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            board: self.board,
            session: self.session,
            json: self.json,
            quiet: self.quiet,
            events: self.events,
        };

        match self.command {
            Commands::Init => init::run(global),
            Commands::Add {
                column,
                title,
                description,
            } => task::run_add(
                task::AddOptions {
                    column,
                    title,
                    description,
                },
                global,
            ),
            Commands::List { column } => task::run_list(task::ListOptions { column }, global),
            Commands::Show { id } => task::run_show(task::ShowOptions { id }, global),
            Commands::Move { id, to, onto } => {
                task::run_move(task::MoveOptions { id, to, onto }, global)
            }
            Commands::Edit {
                id,
                title,
                description,
            } => task::run_edit(
                task::EditOptions {
                    id,
                    title,
                    description,
                },
                global,
            ),
            Commands::Delete { id } => task::run_delete(task::DeleteOptions { id }, global),
            Commands::Sync => sync::run(global),
            Commands::Watch { max_updates } => {
                watch::run(watch::WatchOptions { max_updates }, global)
            }
            Commands::Tool(cmd) => match cmd {
                ToolCommands::List => tool::run_list(global),
                ToolCommands::Call { name, args } => {
                    tool::run_call(tool::CallOptions { name, args }, global)
                }
            },
            Commands::Chat(cmd) => match cmd {
                ChatCommands::Send { text, role } => {
                    chat::run_send(chat::SendOptions { text, role }, global)
                }
                ChatCommands::History => chat::run_history(global),
                ChatCommands::Session { session_id } => {
                    chat::run_session(chat::SessionOptions { session_id }, global)
                }
            },
        }
    }
}

/// An opened board: storage, config, and a controller over the JSONL log.
pub(crate) struct BoardContext {
    pub storage: Storage,
    pub config: Config,
    pub board: BoardController<JsonlLog>,
    pub sink: Option<EventSink>,
    pub events_to_stdout: bool,
}

impl BoardContext {
    /// Mirror committed events to the `--events` sink. A failure is returned
    /// as a warning line; the commit itself has already landed.
    pub fn emit_events(&mut self, events: &[StoredEvent]) -> Option<String> {
        let sink = self.sink.as_mut()?;
        match sink.emit_all(events) {
            Ok(()) => None,
            Err(err) => Some(format!("event output failed: {err}")),
        }
    }

    pub fn output(&self, global: &GlobalOptions) -> crate::output::OutputOptions {
        crate::output::OutputOptions {
            json: global.json && !self.events_to_stdout,
            quiet: global.quiet || self.events_to_stdout,
        }
    }
}

pub(crate) fn resolve_start(board: Option<&PathBuf>) -> Result<PathBuf> {
    match board {
        Some(path) => Ok(path.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

pub(crate) fn load_context(global: &GlobalOptions) -> Result<BoardContext> {
    let start = resolve_start(global.board.as_ref())?;
    let storage = match global.board.as_ref() {
        Some(_) => {
            let storage = Storage::new(start.clone());
            if !storage.is_initialized() {
                return Err(Error::BoardNotFound(start));
            }
            storage
        }
        None => Storage::discover(&start)?,
    };
    let config = Config::load_from_root(storage.root())?;

    let session = global
        .session
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.board.session.clone());
    let store = TaskStore::open(JsonlLog::new(storage.clone()), Some(session))?;
    let board = BoardController::new(store, config.reorder.policy);

    let destination = EventDestination::parse(global.events.as_deref());
    let sink = destination.as_ref().map(|dest| dest.open()).transpose()?;
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));

    tracing::debug!(
        root = %storage.root().display(),
        store_id = %config.board.store_id,
        policy = config.reorder.policy.as_str(),
        "board opened"
    );

    Ok(BoardContext {
        storage,
        config,
        board,
        sink,
        events_to_stdout,
    })
}

/// Warnings for events skipped while the log was read.
pub(crate) fn rejected_warnings(board: &BoardController<JsonlLog>) -> Vec<String> {
    board
        .store()
        .rejected()
        .iter()
        .map(|rejected| {
            format!(
                "skipped {} {}: {}",
                rejected.name, rejected.event_id, rejected.reason
            )
        })
        .collect()
}
