//! kb chat command implementations.
//!
//! Chat messages and the session token ride the same log as tasks.

use chrono::Utc;
use serde::Serialize;
use ulid::Ulid;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{BoardEvent, ChatMessage, ChatRole};

pub struct SendOptions {
    pub text: String,
    pub role: String,
}

pub struct SessionOptions {
    pub session_id: String,
}

#[derive(Serialize)]
struct ChatHistoryOutput<'a> {
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Serialize)]
struct ChatSessionOutput {
    session_id: String,
}

pub fn run_send(options: SendOptions, global: GlobalOptions) -> Result<()> {
    let role: ChatRole = options.role.parse()?;
    let content = options.text.trim();
    if content.is_empty() {
        return Err(Error::InvalidArgument("message cannot be empty".to_string()));
    }

    let mut ctx = load_context(&global)?;
    let message = ChatMessage {
        id: Ulid::new().to_string(),
        content: content.to_string(),
        role,
        created_at: Utc::now(),
    };
    let report = ctx
        .board
        .store_mut()
        .commit(vec![BoardEvent::ChatMessageSent {
            id: message.id.clone(),
            content: message.content.clone(),
            role: message.role,
            created_at: message.created_at,
        }])?;

    let mut human = HumanOutput::new("Message sent");
    if let Some(warning) = ctx.emit_events(&report.events) {
        human.push_warning(warning);
    }
    human.push_summary("ID", message.id.clone());
    human.push_summary("Role", message.role.as_str());

    emit_success(ctx.output(&global), "chat send", &message, Some(&human))
}

pub fn run_history(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let store = ctx.board.store();
    let messages = store.chat_messages();

    let mut human = HumanOutput::new("Chat");
    human.push_summary("Messages", messages.len().to_string());
    if let Some(session) = store.chat_session() {
        human.push_summary("Session", session);
    }
    for message in messages {
        human.push_detail(format!(
            "{} {}: {}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            message.role.as_str(),
            message.content
        ));
    }

    let output = ChatHistoryOutput {
        total: messages.len(),
        session: store.chat_session(),
        messages,
    };
    emit_success(ctx.output(&global), "chat history", &output, Some(&human))
}

pub fn run_session(options: SessionOptions, global: GlobalOptions) -> Result<()> {
    let session_id = options.session_id.trim().to_string();
    if session_id.is_empty() {
        return Err(Error::InvalidArgument("session id cannot be empty".to_string()));
    }

    let mut ctx = load_context(&global)?;
    let report = ctx
        .board
        .store_mut()
        .commit(vec![BoardEvent::ChatSessionUpdated {
            session_id: session_id.clone(),
        }])?;

    let mut human = HumanOutput::new("Chat session updated");
    if let Some(warning) = ctx.emit_events(&report.events) {
        human.push_warning(warning);
    }
    human.push_summary("Session", session_id.clone());

    emit_success(
        ctx.output(&global),
        "chat session",
        &ChatSessionOutput { session_id },
        Some(&human),
    )
}
