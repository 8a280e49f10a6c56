//! Command implementations.

pub mod auth;
pub mod graph;
pub mod menu;

pub use auth::{handle_logout, handle_sign_in, token_manager};
pub use graph::{
    handle_add_todo, handle_calendar, handle_contacts, handle_inbox, handle_people,
    handle_send_mail, handle_todos, handle_token,
};

use crate::cli::ShellType;
use crate::error::Result;

/// Handles the `graph completions <shell>` command.
///
/// Generates shell completion scripts.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell};

    let mut cmd = crate::cli::Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
    };

    generate(shell, &mut cmd, "graph", &mut std::io::stdout());

    Ok(())
}
