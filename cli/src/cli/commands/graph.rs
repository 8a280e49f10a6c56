//! Graph data command handlers.
//!
//! Each handler writes plain text to `out`; the menu and the one-shot
//! subcommands share them.

use std::io::Write;

use chrono::{DateTime, Duration, Local, Utc};

use crate::client::types::{Contact, Event, Message, Person, TodoTask};
use crate::client::GraphApiClient;
use crate::error::{GraphError, Result};

/// Handles `graph token` and menu option 1.
pub async fn handle_token(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    let token = api.tokens().ensure_valid_token().await?;
    writeln!(out, "User token: {token}")?;

    if let Some(state) = api.tokens().token_state().await {
        if let Some(expires) = state.expires_at() {
            writeln!(
                out,
                "    Expires: {}",
                expires.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        if !state.can_refresh() {
            writeln!(out, "    No refresh token; sign in again once it expires.")?;
        }
    }
    Ok(())
}

/// Handles `graph inbox` and menu option 2.
pub async fn handle_inbox(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    for message in api.list_inbox().await? {
        write_message(out, &message)?;
    }
    Ok(())
}

/// Handles `graph send-mail` and menu option 3.
///
/// Without `to`, the mail goes to the signed-in user.
pub async fn handle_send_mail(
    api: &GraphApiClient,
    to: Option<&str>,
    subject: &str,
    body: &str,
    out: &mut impl Write,
) -> Result<()> {
    let recipient = match to {
        Some(address) => address.to_string(),
        None => match api.me().await?.email() {
            Some(email) => email.to_string(),
            None => {
                writeln!(out, "Couldn't get your email address, canceling...")?;
                return Ok(());
            }
        },
    };

    api.send_mail(subject, body, &recipient).await?;
    writeln!(out, "Mail sent")?;
    Ok(())
}

/// Handles `graph calendar`.
pub async fn handle_calendar(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    for event in api.calendar_view(Utc::now()).await? {
        write_event(out, &event)?;
    }
    Ok(())
}

/// Handles `graph people`.
pub async fn handle_people(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    let people = api.people().await?;
    writeln!(out, "People I work with:")?;
    for person in &people {
        write_person(out, person)?;
    }
    Ok(())
}

/// Handles `graph contacts`.
pub async fn handle_contacts(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    let contacts = api.contacts().await?;
    writeln!(out, "My Contacts:")?;
    for contact in &contacts {
        write_contact(out, contact)?;
    }
    Ok(())
}

/// Handles `graph todos`.
pub async fn handle_todos(api: &GraphApiClient, out: &mut impl Write) -> Result<()> {
    let lists = api.todos().await?;
    writeln!(out, "My Todos:")?;
    for (_, tasks) in &lists {
        for task in tasks {
            write_task(out, task)?;
        }
    }
    Ok(())
}

/// Handles `graph add-todo`: due `in_days` days from now.
pub async fn handle_add_todo(
    api: &GraphApiClient,
    title: &str,
    in_days: i64,
    out: &mut impl Write,
) -> Result<()> {
    let due = due_in(Utc::now(), in_days)?;
    let task = api.add_todo(title, due).await?;
    writeln!(
        out,
        "Added '{}' (due {})",
        task.title.as_deref().unwrap_or(title),
        due.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )?;
    Ok(())
}

/// `now` moved by `days`, rejecting offsets outside the representable range.
fn due_in(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| {
            GraphError::InvalidArgument(format!("{days} days from now is not a valid due date"))
        })
}

fn write_message(out: &mut impl Write, message: &Message) -> std::io::Result<()> {
    writeln!(
        out,
        "Message: {}",
        message.subject.as_deref().unwrap_or("NO SUBJECT")
    )?;
    writeln!(out, "    from: {}", message.sender_name().unwrap_or_default())?;
    writeln!(
        out,
        "    Status: {}",
        if message.is_read { "Read" } else { "Unread" }
    )?;
    let received = message
        .received_date_time
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    writeln!(out, "    Received: {received}")
}

fn write_event(out: &mut impl Write, event: &Event) -> std::io::Result<()> {
    let time = |t: Option<&crate::client::types::DateTimeTimeZone>| {
        t.and_then(|t| t.date_time.clone()).unwrap_or_default()
    };

    writeln!(
        out,
        "Subject: {}",
        event.subject.as_deref().unwrap_or("NO SUBJECT")
    )?;
    writeln!(out, "    Start: {}", time(event.start.as_ref()))?;
    writeln!(out, "    End: {}", time(event.end.as_ref()))?;
    writeln!(
        out,
        "    Location: {}",
        event
            .location
            .as_ref()
            .and_then(|l| l.display_name.as_deref())
            .unwrap_or_default()
    )
}

fn write_person(out: &mut impl Write, person: &Person) -> std::io::Result<()> {
    writeln!(out, "Name: {}", person.display_name.as_deref().unwrap_or_default())?;
    writeln!(
        out,
        "    Email: {}",
        person.user_principal_name.as_deref().unwrap_or_default()
    )
}

fn write_contact(out: &mut impl Write, contact: &Contact) -> std::io::Result<()> {
    writeln!(out, "Name: {}", contact.display_name.as_deref().unwrap_or_default())?;
    writeln!(
        out,
        "    Email: {}",
        contact
            .email_addresses
            .first()
            .and_then(|e| e.address.as_deref())
            .unwrap_or_default()
    )?;
    writeln!(
        out,
        "    Business Address: {}",
        contact
            .business_address
            .as_ref()
            .and_then(|a| a.country_or_region.as_deref())
            .unwrap_or_default()
    )
}

fn write_task(out: &mut impl Write, task: &TodoTask) -> std::io::Result<()> {
    writeln!(out, "TODO: {}", task.title.as_deref().unwrap_or_default())?;
    writeln!(
        out,
        "    Due: {}",
        task.due_date_time
            .as_ref()
            .and_then(|d| d.date_time.as_deref())
            .unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<T>(f: impl Fn(&mut Vec<u8>, &T) -> std::io::Result<()>, value: &T) -> String {
        let mut out = Vec::new();
        f(&mut out, value).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn due_date_offsets_from_now() {
        use chrono::TimeZone;

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            due_in(now, 3).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
        );
        assert_eq!(
            due_in(now, -1).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn out_of_range_due_date_is_invalid_argument() {
        let now = Utc::now();
        for days in [100_000_000, i64::MAX, i64::MIN] {
            assert!(matches!(
                due_in(now, days),
                Err(GraphError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn message_without_subject_is_labelled() {
        let message: Message =
            serde_json::from_str(r#"{"isRead":false,"from":{"emailAddress":{"name":"Adele"}}}"#)
                .unwrap();
        let text = render(|o, m| write_message(o, m), &message);

        assert!(text.starts_with("Message: NO SUBJECT\n"));
        assert!(text.contains("    from: Adele\n"));
        assert!(text.contains("    Status: Unread\n"));
    }

    #[test]
    fn event_prints_zone_local_times() {
        let event: Event = serde_json::from_str(
            r#"{"subject":"Standup",
                "start":{"dateTime":"2024-05-02T09:00:00.0000000","timeZone":"UTC"},
                "end":{"dateTime":"2024-05-02T09:15:00.0000000","timeZone":"UTC"},
                "location":{"displayName":"Room 1"}}"#,
        )
        .unwrap();
        let text = render(|o, e| write_event(o, e), &event);

        assert_eq!(
            text,
            "Subject: Standup\n    Start: 2024-05-02T09:00:00.0000000\n    End: 2024-05-02T09:15:00.0000000\n    Location: Room 1\n"
        );
    }

    #[test]
    fn contact_uses_first_address() {
        let contact: Contact = serde_json::from_str(
            r#"{"displayName":"Alex","emailAddresses":[{"address":"alex@contoso.com"},{"address":"a@x.com"}],
                "businessAddress":{"countryOrRegion":"Germany"}}"#,
        )
        .unwrap();
        let text = render(|o, c| write_contact(o, c), &contact);

        assert!(text.contains("    Email: alex@contoso.com\n"));
        assert!(text.contains("    Business Address: Germany\n"));
    }

    #[test]
    fn contact_without_addresses_prints_blank_fields() {
        let contact: Contact = serde_json::from_str(r#"{"displayName":"Alex"}"#).unwrap();
        let text = render(|o, c| write_contact(o, c), &contact);
        assert_eq!(text, "Name: Alex\n    Email: \n    Business Address: \n");
    }

    #[test]
    fn task_prints_due_date() {
        let task: TodoTask = serde_json::from_str(
            r#"{"title":"Pay rent","dueDateTime":{"dateTime":"2024-06-01T00:00:00.0000000","timeZone":"UTC"}}"#,
        )
        .unwrap();
        let text = render(|o, t| write_task(o, t), &task);
        assert_eq!(text, "TODO: Pay rent\n    Due: 2024-06-01T00:00:00.0000000\n");
    }
}
