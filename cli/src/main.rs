//! Graph CLI - Microsoft Graph from the terminal
//!
//! Signs in with the OAuth2 device-code grant, keeps the access token fresh,
//! and reads mail, calendar, people, contacts and to-do lists for the
//! signed-in user.

mod auth;
mod cli;
mod client;
mod config;
mod error;

use std::io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::commands;
use crate::cli::{Cli, Commands};
use crate::client::GraphApiClient;
use crate::config::settings::env;
use crate::config::{load_config, load_config_from};
use crate::error::Result;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL)
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Run the command
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        if e.is_retriable() {
            eprintln!("This is usually temporary. Please try again.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = cli.command {
        return commands::handle_completions(shell);
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let tokens = commands::token_manager(&config)?;

    if let Some(Commands::Logout) = cli.command {
        return commands::handle_logout(&tokens).await;
    }

    commands::handle_sign_in(&tokens, cli.no_browser, cli.manual_confirm).await?;
    let api = GraphApiClient::new(&config.api, tokens)?;
    let out = &mut io::stdout();

    match cli.command {
        None => {
            if let Ok(user) = api.me().await {
                println!(
                    "Hello, {}!",
                    user.display_name.as_deref().unwrap_or("there")
                );
                println!("Email: {}", user.email().unwrap_or_default());
                println!();
            }
            commands::menu::run(&api, &mut io::stdin().lock(), out).await
        }
        Some(Commands::Token) => commands::handle_token(&api, out).await,
        Some(Commands::Inbox) => commands::handle_inbox(&api, out).await,
        Some(Commands::SendMail { to, subject, body }) => {
            commands::handle_send_mail(&api, to.as_deref(), &subject, &body, out).await
        }
        Some(Commands::Calendar) => commands::handle_calendar(&api, out).await,
        Some(Commands::People) => commands::handle_people(&api, out).await,
        Some(Commands::Contacts) => commands::handle_contacts(&api, out).await,
        Some(Commands::Todos) => commands::handle_todos(&api, out).await,
        Some(Commands::AddTodo { title, in_days }) => {
            commands::handle_add_todo(&api, &title, in_days, out).await
        }
        Some(Commands::Logout | Commands::Completions { .. }) => Ok(()),
    }
}
