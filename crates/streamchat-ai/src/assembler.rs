//! Incremental assembly of a streamed assistant reply.
//!
//! Fragments arrive with arbitrary boundaries, so fenced code blocks are
//! tracked with a small character-level parser instead of counting "```"
//! occurrences per fragment: a run of three or more backticks is one fence
//! delimiter, and a run may span several fragments.

use serde::Serialize;

use crate::error::{AiError, Result};

const FENCE_LEN: usize = 3;

/// Snapshot returned after every consumed fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblerOutput {
    /// The fragment that produced this snapshot.
    pub delta: String,
    /// Concatenation of every fragment consumed so far, in arrival order.
    pub accumulated_text: String,
    /// Whether the text currently ends inside a fenced code block.
    pub in_code_fence: bool,
    /// First word of the open fence's info string, once its line is complete.
    pub fence_language: Option<String>,
}

#[derive(Debug, Default)]
struct FenceTracker {
    open: bool,
    backtick_run: usize,
    info: Option<String>,
    language: Option<String>,
}

impl FenceTracker {
    fn feed(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '`' {
                self.backtick_run += 1;
                if self.backtick_run == FENCE_LEN {
                    self.toggle();
                }
                continue;
            }

            self.backtick_run = 0;
            if let Some(info) = self.info.as_mut() {
                if ch == '\n' {
                    self.language = info.split_whitespace().next().map(str::to_string);
                    self.info = None;
                } else {
                    info.push(ch);
                }
            }
        }
    }

    fn toggle(&mut self) {
        self.open = !self.open;
        self.language = None;
        self.info = self.open.then(String::new);
    }
}

/// Accumulates fragments of one assistant reply.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    accumulated: String,
    fence: FenceTracker,
    finalized: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fragment` and report the new state.
    ///
    /// An empty fragment changes nothing and returns the current state.
    pub fn consume(&mut self, fragment: &str) -> Result<AssemblerOutput> {
        if self.finalized {
            return Err(AiError::InvalidState(
                "cannot consume after the reply was finalized".to_string(),
            ));
        }

        self.accumulated.push_str(fragment);
        self.fence.feed(fragment);

        Ok(AssemblerOutput {
            delta: fragment.to_string(),
            accumulated_text: self.accumulated.clone(),
            in_code_fence: self.fence.open,
            fence_language: self.fence.language.clone(),
        })
    }

    /// Return the completed text and make the assembler inert.
    pub fn finalize(&mut self) -> Result<String> {
        if self.finalized {
            return Err(AiError::InvalidState(
                "reply was already finalized".to_string(),
            ));
        }
        self.finalized = true;
        Ok(self.accumulated.clone())
    }

    /// Text assembled so far.
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    pub fn in_code_fence(&self) -> bool {
        self.fence.open
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
