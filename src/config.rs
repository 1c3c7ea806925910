//! Configuration loading and management
//!
//! Handles parsing of `.kanban.toml` at the board root.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::reconcile::ReorderPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Board identity and default session
    #[serde(default)]
    pub board: BoardConfig,

    /// Drag-and-drop reordering
    #[serde(default)]
    pub reorder: ReorderConfig,

    /// `kb watch` settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Board-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Identifier shared by every session of this board
    #[serde(default = "default_store_id")]
    pub store_id: String,

    /// Session name stamped on events when none is given
    #[serde(default = "default_session")]
    pub session: String,
}

fn default_store_id() -> String {
    "kanban-board-store".to_string()
}

fn default_session() -> String {
    "local".to_string()
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            store_id: default_store_id(),
            session: default_session(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReorderConfig {
    /// compact | gap_tolerant
    #[serde(default)]
    pub policy: ReorderPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after a log change before re-reading it
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.kanban.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the board root, or return defaults if absent
    pub fn load_from_root(root: &Path) -> crate::error::Result<Self> {
        let config_path = root.join(crate::storage::CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.board.validate()?;
        self.watch.validate()?;
        Ok(())
    }
}

impl BoardConfig {
    fn validate(&self) -> crate::error::Result<()> {
        let store_id = self.store_id.trim();
        if store_id.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "board.store_id cannot be empty".to_string(),
            ));
        }
        if !store_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(crate::error::Error::InvalidConfig(
                "board.store_id must be alphanumeric, '-' or '_'".to_string(),
            ));
        }
        if self.session.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "board.session cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl WatchConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if !(10..=10_000).contains(&self.debounce_ms) {
            return Err(crate::error::Error::InvalidConfig(format!(
                "watch.debounce_ms must be between 10 and 10000 (got {})",
                self.debounce_ms
            )));
        }
        Ok(())
    }
}
