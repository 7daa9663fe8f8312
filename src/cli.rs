use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chatsync", about = "Realtime messaging sync client")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List conversations, most recent first
    Conversations {
        /// Bypass the local cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show the latest messages of a conversation
    Messages {
        conversation_id: String,
        /// Also load this many older pages
        #[arg(long, default_value_t = 0)]
        older_pages: u32,
    },
    /// Send a text message
    Send {
        conversation_id: String,
        text: String,
    },
    /// Open (or create) the direct conversation with a user
    Dm { user_id: String },
    /// Search the user directory
    Users {
        #[arg(short, long)]
        search: Option<String>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Conversations { refresh: false })
    }
}
