use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use signoff_core::DirectoryEntry;
use thiserror::Error;
use tracing::debug;

use crate::blocks::{MessageTemplate, ModalView};

const USERS_LIST_PAGE_SIZE: &str = "200";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request `{method}` failed: {reason}")]
    Http { method: String, reason: String },
    #[error("slack method `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack method `{method}` returned an unreadable response: {reason}")]
    Decode { method: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// The slice of the Slack Web API the approval workflow needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<DirectoryEntry>, SlackApiError>;

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, SlackApiError>;

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

pub struct WebApiClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

impl WebApiClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, SlackApiError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            SlackApiError::Http { method: "client.build".to_owned(), reason: error.to_string() }
        })?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned(), bot_token })
    }

    /// Asks Slack for a fresh Socket Mode WebSocket URL using the app-level token.
    pub async fn open_socket_connection(
        &self,
        app_token: &SecretString,
    ) -> Result<String, SlackApiError> {
        let request =
            self.client.post(self.url("apps.connections.open")).bearer_auth(app_token.expose_secret());
        let response: ConnectionsOpenResponse = self.call("apps.connections.open", request).await?;
        Ok(response.url)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    fn get(&self, method: &str) -> RequestBuilder {
        self.client.get(self.url(method)).bearer_auth(self.bot_token.expose_secret())
    }

    fn post_json<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> RequestBuilder {
        self.client.post(self.url(method)).bearer_auth(self.bot_token.expose_secret()).json(body)
    }

    async fn call<T>(&self, method: &str, request: RequestBuilder) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(|error| SlackApiError::Http {
            method: method.to_owned(),
            reason: error.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Http {
                method: method.to_owned(),
                reason: format!("unexpected http status {status}"),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(|error| {
            SlackApiError::Decode { method: method.to_owned(), reason: error.to_string() }
        })?;

        let outcome = ApiStatus::deserialize(&body).map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            reason: error.to_string(),
        })?;
        if !outcome.ok {
            return Err(SlackApiError::Api {
                method: method.to_owned(),
                error: outcome.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        debug!(event_name = "egress.slack.api_call", method, "slack api call succeeded");

        T::deserialize(body).map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            reason: error.to_string(),
        })
    }
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn list_users(&self) -> Result<Vec<DirectoryEntry>, SlackApiError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.get("users.list").query(&[("limit", USERS_LIST_PAGE_SIZE)]);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query(&[("cursor", cursor)]);
            }

            let page: UsersListResponse = self.call("users.list", request).await?;
            members.extend(page.members);

            match page.response_metadata.and_then(|metadata| metadata.next_cursor) {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(members)
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let request = self.post_json("views.open", &OpenViewRequest { trigger_id, view });
        let _: serde_json::Value = self.call("views.open", request).await?;
        Ok(())
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, SlackApiError> {
        let request = self.post_json("chat.postMessage", &PostMessageRequest { channel, message });
        self.call("chat.postMessage", request).await
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let request = self.post_json("chat.update", &UpdateMessageRequest { channel, ts, message });
        let _: serde_json::Value = self.call("chat.update", request).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<DirectoryEntry>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

#[derive(Serialize)]
struct OpenViewRequest<'a> {
    trigger_id: &'a str,
    view: &'a ModalView,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}

#[derive(Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}
