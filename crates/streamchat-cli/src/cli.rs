use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version, about = "StreamChat - streaming chat client for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database path (defaults to ~/.streamchat/streamchat.db)
    #[arg(long, global = true, env = "STREAMCHAT_DB_PATH")]
    pub db_path: Option<String>,

    /// Chat API base URL
    #[arg(long, global = true, env = "STREAMCHAT_API_URL")]
    pub api_url: Option<String>,

    /// Model used when none was selected
    #[arg(long, global = true, env = "STREAMCHAT_MODEL")]
    pub model: Option<String>,

    /// System prompt sent with every request
    #[arg(long, global = true, env = "STREAMCHAT_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Interactive chat (default)
    Chat,

    /// Send one message and print the streamed reply
    Send(SendArgs),

    /// Session management
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Model listing and selection
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[derive(Args)]
pub struct SendArgs {
    /// Message to send
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,

    /// Session ID or unique prefix (defaults to the active session)
    #[arg(short = 's', long, conflicts_with = "new_session")]
    pub session: Option<String>,

    /// Start a new session for this message
    #[arg(long)]
    pub new_session: bool,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List all sessions
    List,

    /// Show a session's conversation
    Show {
        /// Session ID or unique prefix
        id: String,
    },

    /// Create a new session and make it active
    Create,

    /// Make a session active
    Switch {
        /// Session ID or unique prefix
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID or unique prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List available models
    List {
        /// Bypass the five-minute cache
        #[arg(long)]
        refresh: bool,
    },

    /// Select the model for future requests
    Select {
        /// Model ID
        id: String,
    },
}
