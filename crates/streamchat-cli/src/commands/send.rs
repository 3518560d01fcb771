use anyhow::{Result, bail};
use colored::Colorize;
use streamchat_ai::RequestState;
use streamchat_core::{Command, NullObserver, StreamingChatSession, TurnSummary};

use crate::cli::SendArgs;
use crate::commands::utils::resolve_session_id;
use crate::output::{OutputFormat, json::print_json};
use crate::render::TerminalRenderer;

pub async fn run(
    chat: &mut StreamingChatSession,
    args: SendArgs,
    format: OutputFormat,
) -> Result<()> {
    if args.new_session {
        chat.dispatch(Command::NewChat, &mut NullObserver).await?;
    } else if let Some(id) = &args.session {
        let resolved = resolve_session_id(chat.store(), id)?;
        chat.dispatch(Command::Switch(resolved), &mut NullObserver)
            .await?;
    }

    let message = args.message.join(" ");
    let summary = if format.is_json() {
        chat.send(&message, &mut NullObserver).await?
    } else {
        chat.send(&message, &mut TerminalRenderer::new()).await?
    };

    if format.is_json() {
        print_json(&summary)?;
    }
    report_failure(&summary)
}

/// Print a failed turn the way the transcript shows it and turn it into an error.
fn report_failure(summary: &TurnSummary) -> Result<()> {
    if summary.state != RequestState::Failed {
        return Ok(());
    }
    let message = summary.error.as_deref().unwrap_or("request failed");
    eprintln!("{}", streamchat_core::chat::FAILURE_NOTICE.red());
    bail!("{message}")
}
