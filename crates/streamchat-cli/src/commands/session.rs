use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;
use serde_json::json;
use streamchat_core::{
    ChatRole, ChatSession, ChatSessionSummary, Command, CommandOutcome, NullObserver,
    StreamingChatSession,
};

use crate::cli::SessionCommands;
use crate::commands::utils::{format_timestamp, resolve_session_id, short_id};
use crate::output::table::{new_table, print_table};
use crate::output::{OutputFormat, json::print_json};

pub async fn run(
    chat: &mut StreamingChatSession,
    command: SessionCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        SessionCommands::List => list_sessions(chat, format),
        SessionCommands::Show { id } => show_session(chat, &id, format),
        SessionCommands::Create => create_session(chat, format).await,
        SessionCommands::Switch { id } => switch_session(chat, &id, format).await,
        SessionCommands::Delete { id } => delete_session(chat, &id, format).await,
    }
}

pub fn list_sessions(chat: &StreamingChatSession, format: OutputFormat) -> Result<()> {
    let active = chat.store().active_id();

    if format.is_json() {
        let sessions: Vec<_> = chat
            .sessions()
            .into_iter()
            .map(|session| {
                json!({
                    "active": session.id == active,
                    "session": ChatSessionSummary::from(session),
                })
            })
            .collect();
        return print_json(&sessions);
    }

    let mut table = new_table(vec!["", "ID", "Title", "Messages", "Updated"]);
    for session in chat.sessions() {
        let marker = if session.id == active { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(short_id(&session.id)),
            Cell::new(session.display_title()),
            Cell::new(session.messages.len()),
            Cell::new(format_timestamp(Some(session.updated_at))),
        ]);
    }
    print_table(table);
    Ok(())
}

fn show_session(chat: &StreamingChatSession, id: &str, format: OutputFormat) -> Result<()> {
    let resolved = resolve_session_id(chat.store(), id)?;
    let Some(session) = chat.store().get(&resolved) else {
        anyhow::bail!("Session not found: {id}");
    };

    if format.is_json() {
        return print_json(session);
    }

    print_transcript(session);
    Ok(())
}

pub fn print_transcript(session: &ChatSession) {
    println!("Session: {} ({})", session.display_title(), session.id);
    if let Some(model) = &session.model {
        println!("Model: {model}");
    }
    println!("Messages: {}", session.messages.len());
    println!("Updated: {}", format_timestamp(Some(session.updated_at)));
    println!();

    for message in &session.messages {
        if message.is_status {
            println!("{}", message.content.red());
            println!();
            continue;
        }
        let role = match message.role {
            ChatRole::User => "You".green().bold(),
            ChatRole::Assistant => "Assistant".blue().bold(),
        };
        println!("{role}");
        println!("{}", message.content);
        println!();
    }
}

async fn create_session(chat: &mut StreamingChatSession, format: OutputFormat) -> Result<()> {
    let outcome = chat.dispatch(Command::NewChat, &mut NullObserver).await?;
    if format.is_json() {
        return print_json(&outcome);
    }
    if let CommandOutcome::SessionCreated { session_id } = outcome {
        println!("Created session: {session_id}");
    }
    Ok(())
}

async fn switch_session(
    chat: &mut StreamingChatSession,
    id: &str,
    format: OutputFormat,
) -> Result<()> {
    let resolved = resolve_session_id(chat.store(), id)?;
    let outcome = chat
        .dispatch(Command::Switch(resolved), &mut NullObserver)
        .await?;
    if format.is_json() {
        return print_json(&outcome);
    }
    if let CommandOutcome::Switched { session_id } = outcome {
        println!("Active session: {session_id}");
    }
    Ok(())
}

async fn delete_session(
    chat: &mut StreamingChatSession,
    id: &str,
    format: OutputFormat,
) -> Result<()> {
    let resolved = resolve_session_id(chat.store(), id)?;
    let outcome = chat
        .dispatch(Command::Delete(resolved), &mut NullObserver)
        .await?;
    if format.is_json() {
        return print_json(&outcome);
    }
    if let CommandOutcome::Deleted { deleted, active } = outcome {
        println!("Deleted session: {deleted}");
        println!("Active session: {active}");
    }
    Ok(())
}
