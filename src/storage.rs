//! Storage layer for kb
//!
//! All board state lives under the board root:
//!
//! ```text
//! .kanban.toml              # Optional configuration
//! .kanban/                  # Board state
//!   events.jsonl            # Append-only event log (one StoredEvent per line)
//!   events.lock             # Advisory lock guarding log appends
//!   snapshot.json           # Projection written by `kb sync`
//!   snapshot.lock
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Name of the board state directory
pub const BOARD_DIR: &str = ".kanban";

/// Name of the board configuration file
pub const CONFIG_FILE: &str = ".kanban.toml";

const EVENTS_LOG: &str = "events.jsonl";
const SNAPSHOT: &str = "snapshot.json";

/// Storage manager for one board
#[derive(Debug, Clone)]
pub struct Storage {
    /// Directory holding `.kanban/` and `.kanban.toml`
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Walk up from `start` until a directory containing `.kanban/` is found.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(BOARD_DIR).is_dir() {
                return Ok(Self::new(dir.to_path_buf()));
            }
            current = dir.parent();
        }
        Err(Error::BoardNotFound(start.to_path_buf()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn board_dir(&self) -> PathBuf {
        self.root.join(BOARD_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn events_file(&self) -> PathBuf {
        self.board_dir().join(EVENTS_LOG)
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.board_dir().join(SNAPSHOT)
    }

    /// Sidecar lock file for `path`
    pub fn lock_file(&self, path: &Path) -> PathBuf {
        path.with_extension("lock")
    }

    // =========================================================================
    // Directory initialization
    // =========================================================================

    /// Create `.kanban/` and an empty event log. Returns true if anything was created.
    pub fn init(&self) -> Result<bool> {
        let board_dir = self.board_dir();
        let mut created = false;
        if !board_dir.exists() {
            fs::create_dir_all(&board_dir)?;
            created = true;
        }
        let events = self.events_file();
        if !events.exists() {
            File::create(&events)?;
            created = true;
        }
        Ok(created)
    }

    pub fn is_initialized(&self) -> bool {
        self.board_dir().is_dir()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Write data using temp file + rename so readers never see partial writes
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Append records to a JSONL file in a single write
    ///
    /// Not locked; callers coordinating with other processes hold a
    /// [`FileLock`](crate::lock::FileLock) around this.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(&buffer)?;
        file.sync_all()?;

        Ok(())
    }

    /// Read all records from a JSONL file, skipping blank lines.
    ///
    /// Readers do not take the append lock, so the last line may still be
    /// mid-write. An unterminated final line that does not parse is skipped;
    /// the next read picks it up once complete.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(err) if !line.ends_with('\n') => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %err,
                        "skipping partial trailing line"
                    );
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(records)
    }
}
