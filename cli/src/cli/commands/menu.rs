//! Interactive numbered menu.

use std::io::{BufRead, Write};

use crate::cli::commands::graph;
use crate::client::GraphApiClient;
use crate::error::{GraphError, Result};

/// Main menu entries, selected by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    ShowToken,
    ListInbox,
    SendMail,
    More,
}

impl MenuChoice {
    /// Parses a line of input; anything that is not a listed number is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().parse::<u8>().ok()? {
            0 => Some(Self::Exit),
            1 => Some(Self::ShowToken),
            2 => Some(Self::ListInbox),
            3 => Some(Self::SendMail),
            4 => Some(Self::More),
            _ => None,
        }
    }
}

/// Sub-menu entries, selected by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancedChoice {
    Calendar,
    People,
    Contacts,
    Todos,
    NewTodo,
    Back,
}

impl AdvancedChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "calendar" => Some(Self::Calendar),
            "people" => Some(Self::People),
            "contacts" => Some(Self::Contacts),
            "todos" => Some(Self::Todos),
            "new todo" => Some(Self::NewTodo),
            "_" => Some(Self::Back),
            _ => None,
        }
    }
}

/// Runs the menu until `0` or end of input.
///
/// The access token is checked (and refreshed if stale) before every dispatch.
/// Failed actions are reported and the menu continues; a failed token check
/// that needs a new sign-in ends the loop with that error.
pub async fn run(api: &GraphApiClient, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    loop {
        writeln!(out, "Please choose one of the following options:")?;
        writeln!(out, "0. Exit")?;
        writeln!(out, "1. Display access token")?;
        writeln!(out, "2. List my inbox")?;
        writeln!(out, "3. Send mail")?;
        writeln!(out, "4. Other API calls")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            writeln!(out, "Goodbye...")?;
            return Ok(());
        };
        let choice = MenuChoice::parse(&line);

        if let Err(e) = api.tokens().ensure_valid_token().await {
            if e.requires_reauth() {
                return Err(e);
            }
            writeln!(out, "Error checking token: {e}")?;
            continue;
        }

        let result = match choice {
            Some(MenuChoice::Exit) => {
                writeln!(out, "Goodbye...")?;
                return Ok(());
            }
            Some(MenuChoice::ShowToken) => graph::handle_token(api, out).await,
            Some(MenuChoice::ListInbox) => graph::handle_inbox(api, out).await,
            Some(MenuChoice::SendMail) => {
                graph::handle_send_mail(api, None, "Testing Microsoft Graph", "Hello world", out)
                    .await
            }
            Some(MenuChoice::More) => run_advanced(api, input, out).await,
            None => {
                writeln!(out, "Invalid choice! Please try again.")?;
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = ?e, "menu action failed");
            writeln!(out, "Error: {e}")?;
        }
    }
}

/// The keyword sub-menu; repeats until a valid entry is given.
async fn run_advanced(
    api: &GraphApiClient,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    loop {
        writeln!(out, "Please choose one of the following options:")?;
        for entry in ["calendar", "people", "contacts", "todos", "new todo", "_"] {
            writeln!(out, "{entry}")?;
        }
        out.flush()?;

        let line = read_line(input)?.unwrap_or_else(|| "_".to_string());
        let Some(choice) = AdvancedChoice::parse(&line) else {
            writeln!(out, "Invalid choice")?;
            continue;
        };

        return match choice {
            AdvancedChoice::Calendar => graph::handle_calendar(api, out).await,
            AdvancedChoice::People => graph::handle_people(api, out).await,
            AdvancedChoice::Contacts => graph::handle_contacts(api, out).await,
            AdvancedChoice::Todos => graph::handle_todos(api, out).await,
            AdvancedChoice::NewTodo => new_todo(api, input, out).await,
            AdvancedChoice::Back => Ok(()),
        };
    }
}

async fn new_todo(api: &GraphApiClient, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Task: ")?;
    out.flush()?;
    let title = read_line(input)?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "temp".to_string());

    write!(out, "Date: Today + ")?;
    out.flush()?;
    let offset = match read_line(input)?.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(days) => days.parse().map_err(|_| {
            GraphError::InvalidArgument(format!("'{days}' is not a number of days"))
        })?,
    };

    graph::handle_add_todo(api, &title, offset, out).await
}

/// Reads one line without its terminator; `None` at end of input.
fn read_line(input: &mut impl BufRead) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
