use async_trait::async_trait;
use signoff_core::DirectoryEntry;
use tokio::sync::Mutex;

use crate::{
    api::{PostedMessage, SlackApi, SlackApiError},
    blocks::{MessageTemplate, ModalView},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiCall {
    ListUsers,
    OpenView { trigger_id: String, view: ModalView },
    PostMessage { channel: String, message: MessageTemplate },
    UpdateMessage { channel: String, ts: String, message: MessageTemplate },
}

#[derive(Default)]
pub(crate) struct RecordingSlackApi {
    directory: Vec<DirectoryEntry>,
    failing_method: Option<&'static str>,
    calls: Mutex<Vec<ApiCall>>,
}

impl RecordingSlackApi {
    pub(crate) fn with_directory(directory: Vec<DirectoryEntry>) -> Self {
        Self { directory, ..Self::default() }
    }

    pub(crate) fn failing_on(mut self, method: &'static str) -> Self {
        self.failing_method = Some(method);
        self
    }

    pub(crate) async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, method: &str, call: ApiCall) -> Result<(), SlackApiError> {
        self.calls.lock().await.push(call);
        if self.failing_method == Some(method) {
            return Err(SlackApiError::Api {
                method: method.to_owned(),
                error: "channel_not_found".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SlackApi for RecordingSlackApi {
    async fn list_users(&self) -> Result<Vec<DirectoryEntry>, SlackApiError> {
        self.record("users.list", ApiCall::ListUsers).await?;
        Ok(self.directory.clone())
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(
            "views.open",
            ApiCall::OpenView { trigger_id: trigger_id.to_owned(), view: view.clone() },
        )
        .await
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, SlackApiError> {
        self.record(
            "chat.postMessage",
            ApiCall::PostMessage { channel: channel.to_owned(), message: message.clone() },
        )
        .await?;
        Ok(PostedMessage { channel: channel.to_owned(), ts: "1730000000.000100".to_owned() })
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.record(
            "chat.update",
            ApiCall::UpdateMessage {
                channel: channel.to_owned(),
                ts: ts.to_owned(),
                message: message.clone(),
            },
        )
        .await
    }
}

pub(crate) fn entry(id: &str, name: &str, real_name: Option<&str>, is_bot: bool) -> DirectoryEntry {
    DirectoryEntry {
        id: id.to_owned(),
        name: name.to_owned(),
        real_name: real_name.map(str::to_owned),
        is_bot,
    }
}

/// Alice requests, Bob approves, and a bot that must never be offered.
pub(crate) fn scenario_directory() -> Vec<DirectoryEntry> {
    vec![
        entry("U1", "alice", Some("Alice"), false),
        entry("U2", "bob", Some("Bob"), false),
        entry("B1", "bot", None, true),
    ]
}
