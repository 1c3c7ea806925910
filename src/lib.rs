//! kanban - event-sourced Kanban board core
//!
//! This library provides the board engine behind the `kb` CLI. Tasks live
//! in three fixed columns; every change is an event appended to a shared
//! log, and the board is a deterministic projection of that log.
//!
//! # Core Concepts
//!
//! - **Events**: `v1.TaskCreated`, `v1.TaskMoved`, `v1.TaskUpdated`,
//!   `v1.TaskDeleted` (plus chat events), wrapped in stored envelopes
//! - **Projection**: materialized rows rebuilt by replaying the log
//! - **Sessions**: several stores sharing one ordered log
//! - **Reconciler**: turns a drag-and-drop into one batch of moves
//!
//! # Module Organization
//!
//! - `task`: columns, rows, the event vocabulary
//! - `projection`: materializers and read queries
//! - `log`: the `EventLog` trait with memory and JSONL implementations
//! - `store`: commit, pull, and reactive subscriptions
//! - `reconcile`: drop target resolution and sibling renumbering
//! - `board`: drag, add-task, and edit state over a store
//! - `tools`: named capability operations for agents
//! - `storage`: board directory layout and file helpers
//! - `lock`: file locking for concurrent appends
//! - `config`: configuration loading from `.kanban.toml`
//! - `events`: JSONL event mirroring for integrations
//! - `output`: human and JSON output for the CLI
//! - `cli`: command-line interface using clap

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod log;
pub mod output;
pub mod projection;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod task;
pub mod tools;

pub use error::{Error, Result};
