#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub fn kb_cmd() -> Command {
    let mut cmd = Command::cargo_bin("kb").expect("kb binary");
    cmd.env_remove("KB_BOARD")
        .env_remove("KB_SESSION")
        .env_remove("RUST_LOG");
    cmd
}

pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    /// Empty temp dir, not yet initialized.
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    /// Temp dir with `kb init` already run.
    pub fn init() -> Self {
        let board = Self::empty();
        board.cmd().arg("init").assert().success();
        board
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = kb_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    pub fn events_file(&self) -> PathBuf {
        self.path().join(".kanban").join("events.jsonl")
    }

    pub fn write_config(&self, contents: &str) {
        fs::write(self.path().join(".kanban.toml"), contents).expect("write config");
    }

    /// Run `kb --json <args>` expecting success; returns the envelope.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    /// Run `kb --json <args>` expecting failure; returns the error envelope.
    pub fn json_err(&self, args: &[&str], code: i32) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json error envelope")
    }

    pub fn add(&self, column: &str, title: &str) -> String {
        let value = self.json(&["add", column, title]);
        value["data"]["id"].as_str().expect("task id").to_string()
    }

    /// `(title, position)` pairs of one column, in board order.
    pub fn column(&self, column: &str) -> Vec<(String, u64)> {
        let value = self.json(&["list", "--column", column]);
        value["data"]["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .map(|task| {
                (
                    task["title"].as_str().expect("title").to_string(),
                    task["position"].as_u64().expect("position"),
                )
            })
            .collect()
    }

    pub fn log_lines(&self) -> Vec<Value> {
        let contents = fs::read_to_string(self.events_file()).unwrap_or_default();
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("log line"))
            .collect()
    }
}

pub fn pairs(items: &[(&str, u64)]) -> Vec<(String, u64)> {
    items
        .iter()
        .map(|(title, position)| (title.to_string(), *position))
        .collect()
}
