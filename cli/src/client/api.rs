//! Microsoft Graph API client implementation.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use http::header::{ACCEPT, WWW_AUTHENTICATE};
use http::{Extensions, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::{form_urlencoded, Url};

use crate::auth::TokenManager;
use crate::client::middleware::{AuthMiddleware, ClaimsChallenge};
use crate::client::request::{AuthenticatedRequestFactory, RequestDescriptor};
use crate::client::types::{
    Collection, Contact, Event, Message, Person, TodoTask, TodoTaskList, User,
};
use crate::config::ApiConfig;
use crate::error::{GraphError, Result};

/// Messages fetched per inbox listing.
const INBOX_PAGE_SIZE: &str = "25";

/// Days ahead covered by the calendar view.
const CALENDAR_WINDOW_DAYS: i64 = 7;

/// Graph timestamp format for query parameters.
const GRAPH_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Client for the signed-in user's mail, calendar, contacts and to-do data.
pub struct GraphApiClient {
    client: ClientWithMiddleware,
    tokens: Arc<TokenManager>,
    requests: RwLock<AuthenticatedRequestFactory>,
    todo_list: String,
}

impl GraphApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is invalid.
    pub fn new(config: &ApiConfig, tokens: Arc<TokenManager>) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("graph-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let client = ClientBuilder::new(inner_client)
            .with(AuthMiddleware::new(Arc::clone(&tokens)))
            .build();

        Ok(Self {
            client,
            tokens,
            requests: RwLock::new(AuthenticatedRequestFactory::new(
                &config.base_url,
                String::new(),
            )?),
            todo_list: config.todo_list.clone(),
        })
    }

    /// The token manager backing this client.
    pub const fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// The signed-in user's profile.
    pub async fn me(&self) -> Result<User> {
        let suffix = format!(
            "?{}",
            query(&[("$select", "displayName,mail,userPrincipalName")])
        );
        self.get_json(&suffix).await
    }

    /// The 25 newest inbox messages.
    pub async fn list_inbox(&self) -> Result<Vec<Message>> {
        let suffix = format!(
            "/mailFolders/inbox/messages?{}",
            query(&[
                ("$select", "from,isRead,receivedDateTime,subject"),
                ("$top", INBOX_PAGE_SIZE),
                ("$orderby", "receivedDateTime desc"),
            ])
        );
        Ok(self.get_json::<Collection<Message>>(&suffix).await?.value)
    }

    /// Sends a plain-text message to one recipient.
    pub async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<()> {
        if recipient.trim().is_empty() {
            return Err(GraphError::InvalidArgument(
                "recipient address must not be empty".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "message": {
                "subject": subject,
                "body": { "contentType": "Text", "content": body },
                "toRecipients": [ { "emailAddress": { "address": recipient } } ],
            }
        });

        let descriptor = self
            .prepare("/sendMail", Method::POST)
            .await?
            .with_json(&payload)?;
        self.execute(descriptor).await?;
        Ok(())
    }

    /// Events between `now` and seven days later.
    pub async fn calendar_view(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let start = now.format(GRAPH_TIMESTAMP).to_string();
        let end = (now + chrono::Duration::days(CALENDAR_WINDOW_DAYS))
            .format(GRAPH_TIMESTAMP)
            .to_string();

        let suffix = format!(
            "/calendarView?{}",
            query(&[
                ("startDateTime", start.as_str()),
                ("endDateTime", end.as_str()),
                ("$select", "subject,start,end,location"),
            ])
        );
        Ok(self.get_json::<Collection<Event>>(&suffix).await?.value)
    }

    /// People the user works with.
    pub async fn people(&self) -> Result<Vec<Person>> {
        Ok(self.get_json::<Collection<Person>>("/people").await?.value)
    }

    /// Outlook contacts.
    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        let suffix = format!(
            "/contacts?{}",
            query(&[("$select", "displayName,emailAddresses,businessAddress")])
        );
        Ok(self.get_json::<Collection<Contact>>(&suffix).await?.value)
    }

    /// All to-do lists.
    pub async fn task_lists(&self) -> Result<Vec<TodoTaskList>> {
        Ok(self
            .get_json::<Collection<TodoTaskList>>("/todo/lists")
            .await?
            .value)
    }

    /// Tasks of one list, earliest due first.
    pub async fn tasks(&self, list_id: &str) -> Result<Vec<TodoTask>> {
        let suffix = format!(
            "/todo/lists/{}/tasks?{}",
            path_segment(list_id)?,
            query(&[("$orderby", "dueDateTime/dateTime")])
        );
        Ok(self.get_json::<Collection<TodoTask>>(&suffix).await?.value)
    }

    /// Every list with its tasks.
    pub async fn todos(&self) -> Result<Vec<(TodoTaskList, Vec<TodoTask>)>> {
        let mut all = Vec::new();
        for list in self.task_lists().await? {
            let tasks = self.tasks(&list.id).await?;
            all.push((list, tasks));
        }
        Ok(all)
    }

    /// Adds a task due at `due` to the configured list.
    pub async fn add_todo(&self, title: &str, due: DateTime<Utc>) -> Result<TodoTask> {
        let list = self
            .task_lists()
            .await?
            .into_iter()
            .find(|l| l.display_name.as_deref() == Some(self.todo_list.as_str()))
            .ok_or_else(|| GraphError::TaskListNotFound(self.todo_list.clone()))?;

        let payload = serde_json::json!({
            "title": title,
            "dueDateTime": {
                "dateTime": due.format(GRAPH_TIMESTAMP).to_string(),
                "timeZone": "UTC",
            }
        });

        let suffix = format!("/todo/lists/{}/tasks", path_segment(&list.id)?);
        let descriptor = self
            .prepare(&suffix, Method::POST)
            .await?
            .with_json(&payload)?;
        let response = self.execute(descriptor).await?;

        response
            .json()
            .await
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, suffix: &str) -> Result<T> {
        let descriptor = self.prepare(suffix, Method::GET).await?;
        let response = self.execute(descriptor).await?;

        response
            .json()
            .await
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Builds a request with a token that is valid right now.
    async fn prepare(&self, suffix: &str, method: Method) -> Result<RequestDescriptor> {
        let token = self.tokens.ensure_valid_token().await?;

        let mut requests = self.requests.write().await;
        if requests.token() != token {
            requests.update_token(token);
        }
        requests
            .build_request(suffix, method)?
            .with_header(ACCEPT, HeaderValue::from_static("application/json"))
    }

    /// Sends a request, answering one claims challenge with a refresh and a re-send.
    async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        tracing::debug!(method = %descriptor.method(), url = %descriptor.url(), "sending request");

        let response = self.client.execute(descriptor.clone().into_request()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let Some(claims) = claims_from(response.headers()) else {
            tracing::warn!("Received 401 Unauthorized - credentials may be invalid");
            return Err(GraphError::Unauthorized);
        };

        tracing::warn!("claims challenge received, refreshing tokens");
        let refreshed = self.tokens.refresh_with_claims(&claims).await?;
        self.requests
            .write()
            .await
            .update_token(refreshed.access_token.secret().clone());

        let mut extensions = Extensions::new();
        extensions.insert(ClaimsChallenge(claims));
        let response = self
            .client
            .execute_with_extensions(descriptor.into_request(), &mut extensions)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("token rejected again after claims challenge");
            return Err(GraphError::Unauthorized);
        }
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GraphError::ApiError {
        status: status.as_u16(),
        message,
    })
}

fn query(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Percent-encodes `raw` as a single URL path segment.
fn path_segment(raw: &str) -> Result<String> {
    let unencodable = || GraphError::InvalidArgument(format!("cannot encode path segment '{raw}'"));
    let mut url = Url::parse("http://localhost/").map_err(|_| unencodable())?;
    url.path_segments_mut()
        .map_err(|()| unencodable())?
        .clear()
        .push(raw);
    Ok(url.path().trim_start_matches('/').to_string())
}

/// Extracts the decoded `claims` parameter of a `WWW-Authenticate` challenge.
fn claims_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(parse_claims)
}

fn parse_claims(challenge: &str) -> Option<String> {
    const KEY: &str = "claims=\"";

    let start = challenge.find(KEY)? + KEY.len();
    let rest = &challenge[start..];
    let raw = &rest[..rest.find('"')?];
    if raw.is_empty() {
        return None;
    }

    // Graph sends base64; tolerate providers that send the JSON itself.
    Some(
        STANDARD
            .decode(raw)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| raw.to_string()),
    )
}
