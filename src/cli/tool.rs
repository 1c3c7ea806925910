//! kb tool command implementations.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::log::EventLog;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::tools::{descriptors, dispatch, ToolCall, ToolDescriptor};

pub struct CallOptions {
    pub name: String,
    pub args: Option<String>,
}

#[derive(Serialize)]
struct ToolListOutput {
    tools: Vec<ToolDescriptor>,
}

#[derive(Serialize)]
struct ToolCallOutput {
    tool: String,
    text: String,
    is_error: bool,
    events: usize,
}

pub fn run_list(global: GlobalOptions) -> Result<()> {
    let tools = descriptors();
    let mut human = HumanOutput::new("Tools");
    for tool in &tools {
        human.push_detail(format!("{}: {}", tool.name, tool.description));
    }

    emit_success(
        OutputOptions {
            json: global.json,
            quiet: global.quiet,
        },
        "tool list",
        &ToolListOutput { tools },
        Some(&human),
    )
}

/// Error results still exit 0: the tool ran and answered.
pub fn run_call(options: CallOptions, global: GlobalOptions) -> Result<()> {
    let args = match options.args.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| Error::InvalidArgument(format!("--args is not valid JSON: {err}")))?,
        None => serde_json::Value::Null,
    };
    let call = ToolCall::parse(&options.name, args)?;

    let mut ctx = load_context(&global)?;
    let before = ctx.board.store().cursor();
    let output = dispatch(&mut ctx.board, call)?;
    let after = ctx.board.store().cursor();

    let mut human = HumanOutput::new(output.text.clone());
    let mut committed = 0;
    if after > before {
        let session = ctx.board.store().session().map(str::to_string);
        let appended: Vec<_> = ctx
            .board
            .store()
            .log()
            .read_from(before)?
            .into_iter()
            .filter(|stored| stored.session == session)
            .collect();
        committed = appended.len();
        if let Some(warning) = ctx.emit_events(&appended) {
            human.push_warning(warning);
        }
    }

    let data = ToolCallOutput {
        tool: options.name,
        text: output.text,
        is_error: output.is_error,
        events: committed,
    };
    emit_success(ctx.output(&global), "tool call", &data, Some(&human))
}
