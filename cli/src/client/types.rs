//! Payloads of the Graph `/me` endpoints, reduced to the fields the CLI prints.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `{ "value": [...] }` wrapper returned by collection endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// The signed-in user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

impl User {
    /// Work/school accounts carry `mail`; personal accounts only the principal name.
    pub fn email(&self) -> Option<&str> {
        fn present(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        present(&self.mail).or_else(|| present(&self.user_principal_name))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

/// Inbox message summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    #[serde(default)]
    pub is_read: bool,
    pub received_date_time: Option<DateTime<Utc>>,
}

impl Message {
    pub fn sender_name(&self) -> Option<&str> {
        self.from
            .as_ref()?
            .email_address
            .as_ref()?
            .name
            .as_deref()
    }
}

/// Zone-qualified timestamp as Graph returns it (`dateTime` is zone-local text).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: Option<String>,
}

/// Calendar event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub subject: Option<String>,
    pub start: Option<DateTimeTimeZone>,
    pub end: Option<DateTimeTimeZone>,
    pub location: Option<Location>,
}

/// Someone the user works with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalAddress {
    pub country_or_region: Option<String>,
}

/// Outlook contact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub business_address: Option<PhysicalAddress>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTaskList {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTask {
    pub title: Option<String>,
    pub due_date_time: Option<DateTimeTimeZone>,
}
