//! Error types for session management

use streamchat_ai::AiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session {0} is still waiting for a reply")]
    TurnInProgress(String),

    #[error("Session {0} has no reply in progress")]
    NoTurnInProgress(String),

    #[error("Message is empty")]
    EmptyInput,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Nothing to resend in session {0}")]
    NothingToResend(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
