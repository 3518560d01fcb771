//! Streams replies to the terminal.

use std::io::Write;

use colored::Colorize;
use streamchat_ai::{AbortHandle, AssemblerOutput, RequestState};
use streamchat_core::TurnObserver;
use tokio::task::JoinHandle;

/// Prints deltas as they arrive, code blocks highlighted, and aborts the
/// request on Ctrl-C.
#[derive(Default)]
pub struct TerminalRenderer {
    ctrl_c: Option<JoinHandle<()>>,
    printed: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn stop_listening(&mut self) {
        if let Some(listener) = self.ctrl_c.take() {
            listener.abort();
        }
    }
}

impl TurnObserver for TerminalRenderer {
    fn on_started(&mut self, abort: &AbortHandle) {
        self.stop_listening();
        self.printed = false;
        let abort = abort.clone();
        self.ctrl_c = Some(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.abort();
            }
        }));
    }

    fn on_state(&mut self, state: RequestState) {
        if !state.is_terminal() {
            return;
        }
        self.stop_listening();
        if self.printed {
            println!();
        }
        if state == RequestState::Aborted {
            println!("{}", "[cancelled]".dimmed());
        }
    }

    fn on_delta(&mut self, output: &AssemblerOutput) {
        if output.delta.is_empty() {
            return;
        }
        self.printed = true;
        let mut stdout = std::io::stdout().lock();
        let written = if output.in_code_fence {
            write!(stdout, "{}", output.delta.cyan())
        } else {
            write!(stdout, "{}", output.delta)
        };
        if written.and_then(|_| stdout.flush()).is_err() {
            tracing::debug!("stdout closed while streaming");
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        self.stop_listening();
    }
}
