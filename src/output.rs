//! Shared output formatting for kb CLI commands.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};

pub const SCHEMA_VERSION: &str = "kb.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }

    /// Header, then one blank-line-separated block per non-empty section.
    fn render(&self) -> String {
        let summary: Vec<String> = self
            .summary
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{key}: {value}")
                }
            })
            .collect();
        let sections = [
            ("Summary", &summary),
            ("Details", &self.details),
            ("Warnings", &self.warnings),
            ("Next steps", &self.next_steps),
        ];

        let mut out = self.header.clone();
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            out.push_str(&format!("\n\n{title}:"));
            for item in items {
                out.push_str(&format!("\n- {item}"));
            }
        }
        out
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        println!("{}", render_success(command, data, human)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

fn render_success<T: Serialize>(
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<String> {
    let payload = SuccessEnvelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "success",
        data,
        warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
        next_steps: human.map(|h| h.next_steps.clone()).unwrap_or_default(),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        println!("{}", render_error(command, err)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_next_steps(err).first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

fn render_error(command: &str, err: &Error) -> Result<String> {
    #[derive(Serialize)]
    struct ErrorBody<'a> {
        message: &'a str,
        code: i32,
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    }

    #[derive(Serialize)]
    struct Envelope<'a> {
        schema_version: &'static str,
        command: &'a str,
        status: &'static str,
        error: ErrorBody<'a>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        next_steps: Vec<String>,
    }

    let payload = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: ErrorBody {
            message: &err.to_string(),
            code: err.exit_code(),
            kind: error_kind(err),
            details: err.details(),
        },
        next_steps: error_next_steps(err),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn format_human(output: &HumanOutput) -> String {
    output.render()
}

pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl Iterator<Item = String>) -> String {
    let mut positional = args.filter(|arg| !arg.starts_with('-'));

    let command = match positional.next() {
        Some(cmd) => cmd,
        None => return "kb".to_string(),
    };

    if matches!(command.as_str(), "tool" | "chat") {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::REJECTED => "rejected",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::BoardNotFound(_) => vec!["kb init".to_string()],
        Error::InvalidConfig(_) => vec!["fix .kanban.toml then retry".to_string()],
        Error::UnknownColumn(_) => vec!["columns are: todo, doing, done".to_string()],
        Error::TaskNotFound(_) | Error::UnknownDropTarget(_) => vec!["kb list".to_string()],
        Error::DuplicateTask(_) | Error::DuplicateMessage(_) => vec!["kb sync".to_string()],
        Error::LockFailed(_) => vec!["retry; another kb process holds the board lock".to_string()],
        _ => Vec::new(),
    }
}
