//! Interactive chat loop.

use std::future::Future;
use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use streamchat_ai::RequestState;
use streamchat_core::{
    Command, CommandOutcome, NullObserver, SessionError, StreamingChatSession, TurnSummary,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::commands::models::print_models;
use crate::commands::session::{list_sessions, print_transcript};
use crate::commands::utils::resolve_session_id;
use crate::output::OutputFormat;
use crate::render::TerminalRenderer;

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Message(String),
    Help,
    Exit,
    New,
    List,
    Show,
    Switch(String),
    Delete(String),
    Models,
    Model(String),
    Resend,
    Unknown(String),
    Empty,
}

impl ReplInput {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = input.strip_prefix('/') else {
            return Self::Message(input.to_string());
        };

        let mut parts = rest.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let arg = parts
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        match (cmd.as_str(), arg) {
            ("help" | "h" | "?", _) => Self::Help,
            ("exit" | "quit" | "q", _) => Self::Exit,
            ("new" | "n", _) => Self::New,
            ("list" | "ls", _) => Self::List,
            ("show" | "history", _) => Self::Show,
            ("switch" | "s", Some(id)) => Self::Switch(id),
            ("delete" | "rm", Some(id)) => Self::Delete(id),
            ("models", _) => Self::Models,
            ("model" | "m", Some(id)) => Self::Model(id),
            ("model" | "m", None) => Self::Models,
            ("resend" | "retry", _) => Self::Resend,
            _ => Self::Unknown(input.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  /new            start a new chat
  /list           list chats
  /show           print the current chat
  /switch <id>    switch to a chat (ID or prefix)
  /delete <id>    delete a chat
  /models         list models
  /model <id>     select a model
  /resend         resend the last unanswered message
  /quit           leave
Press Ctrl-C while a reply streams to stop it, or at the prompt to leave.";

pub async fn run(chat: &mut StreamingChatSession) -> Result<()> {
    println!("{}", "StreamChat".bold());
    println!("{}", "Type /help for commands.".dimmed());
    println!();
    print_transcript(chat.active()?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = next_line(&mut lines, tokio::signal::ctrl_c()).await? else {
            println!();
            return Ok(());
        };

        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Exit => return Ok(()),
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Unknown(input) => {
                println!("{} {input} (try /help)", "Unknown command:".yellow())
            }
            input => {
                if let Err(error) = handle(chat, input).await {
                    println!("{} {error:#}", "Error:".red().bold());
                }
            }
        }
    }
}

/// Next typed line, or `None` at end of input or once `interrupt` fires.
async fn next_line<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = interrupt => Ok(None),
    }
}

async fn handle(chat: &mut StreamingChatSession, input: ReplInput) -> Result<()> {
    let command = match input {
        ReplInput::List => return list_sessions(chat, OutputFormat::Text),
        ReplInput::Show => {
            print_transcript(chat.active()?);
            return Ok(());
        }
        ReplInput::Models => {
            let listing = chat.models().await?;
            return print_models(chat, &listing, OutputFormat::Text);
        }
        ReplInput::Message(text) => Command::Send(text),
        ReplInput::Resend => Command::Resend,
        ReplInput::New => Command::NewChat,
        ReplInput::Model(id) => Command::SelectModel(id),
        ReplInput::Switch(id) => Command::Switch(resolve_session_id(chat.store(), &id)?),
        ReplInput::Delete(id) => Command::Delete(resolve_session_id(chat.store(), &id)?),
        ReplInput::Help | ReplInput::Exit | ReplInput::Unknown(_) | ReplInput::Empty => {
            return Ok(());
        }
    };

    let streams = matches!(command, Command::Send(_) | Command::Resend);
    let outcome = if streams {
        println!("{}", "Assistant".blue().bold());
        chat.dispatch(command, &mut TerminalRenderer::new()).await
    } else {
        chat.dispatch(command, &mut NullObserver).await
    };

    match outcome {
        Ok(CommandOutcome::Turn(summary)) => print_turn_end(&summary),
        Ok(CommandOutcome::SessionCreated { .. }) | Ok(CommandOutcome::Switched { .. }) => {
            println!();
            print_transcript(chat.active()?);
        }
        Ok(CommandOutcome::Deleted { deleted, active }) => {
            println!("Deleted {deleted}; active chat is now {active}.");
        }
        Ok(CommandOutcome::ModelSelected { model }) => println!("Using model {model}."),
        Err(SessionError::NothingToResend(_)) => {
            println!("{}", "Nothing to resend.".yellow());
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

fn print_turn_end(summary: &TurnSummary) {
    if summary.state == RequestState::Failed {
        let message = summary.error.as_deref().unwrap_or("request failed");
        println!(
            "{}",
            format!("{}: {message}", streamchat_core::chat::FAILURE_NOTICE).red()
        );
        println!("{}", "Use /resend to try again.".dimmed());
    }
    println!();
}
