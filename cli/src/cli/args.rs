//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Console client for Microsoft Graph.
///
/// Signs in with a device code, then reads your inbox, calendar, people,
/// contacts and to-do lists. Run without a command for the interactive menu.
#[derive(Parser, Debug)]
#[command(name = "graph")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute. Omit for the interactive menu.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file to load instead of the default.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip opening the browser automatically.
    #[arg(long, global = true)]
    pub no_browser: bool,

    /// Poll for the token only when Enter is pressed.
    #[arg(long, global = true)]
    pub manual_confirm: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current access token.
    Token,

    /// List the 25 newest inbox messages.
    Inbox,

    /// Send a plain-text mail (to yourself by default).
    SendMail {
        /// Recipient address. Defaults to the signed-in user.
        #[arg(long)]
        to: Option<String>,

        /// Subject line.
        #[arg(long, default_value = "Testing Microsoft Graph")]
        subject: String,

        /// Message body.
        #[arg(long, default_value = "Hello world")]
        body: String,
    },

    /// Show calendar events for the next seven days.
    Calendar,

    /// List people you work with.
    People,

    /// List your Outlook contacts.
    Contacts,

    /// List every to-do list and its tasks.
    Todos,

    /// Add a task to the configured to-do list.
    AddTodo {
        /// Task title.
        title: String,

        /// Days from now the task is due.
        #[arg(long, default_value_t = 0)]
        in_days: i64,
    },

    /// Sign out and remove cached tokens.
    Logout,

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Supported shell types for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
