use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use signoff_core::PayloadError;
use thiserror::Error;

use crate::{
    api::{SlackApi, SlackApiError},
    commands::{ApprovalCommandHandler, SlashCommandPayload},
    interactions::{DecisionHandler, SubmissionHandler},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    ViewSubmission(ViewSubmissionEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn route_key(&self) -> Option<RouteKey> {
        match self {
            Self::SlashCommand(payload) => Some(RouteKey::command(&payload.command)),
            Self::ViewSubmission(event) => Some(RouteKey::View(event.callback_id.clone())),
            Self::BlockAction(event) => Some(RouteKey::Action(event.action_id.clone())),
            Self::Unsupported { .. } => None,
        }
    }

    /// Parses the `payload` of a Socket Mode envelope of the given `type`.
    pub fn from_socket_payload(kind: &str, payload: Value) -> Result<Self, EventParseError> {
        match kind {
            "slash_commands" => serde_json::from_value(payload)
                .map(Self::SlashCommand)
                .map_err(|error| EventParseError::malformed("slash_commands", error)),
            "interactive" => Self::from_interactive_value(payload),
            "events_api" => Ok(Self::from_event_callback(&payload)),
            other => Ok(Self::Unsupported { event_type: other.to_owned() }),
        }
    }

    /// Parses the JSON carried in the `payload` field of an interactivity request.
    pub fn from_interactive_payload(raw: &str) -> Result<Self, EventParseError> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|error| EventParseError::malformed("interactive", error))?;
        Self::from_interactive_value(payload)
    }

    pub fn from_interactive_value(payload: Value) -> Result<Self, EventParseError> {
        let kind = payload.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned();

        match kind.as_str() {
            "view_submission" => {
                let raw: RawViewSubmission = serde_json::from_value(payload)
                    .map_err(|error| EventParseError::malformed("view_submission", error))?;
                Ok(Self::ViewSubmission(raw.into()))
            }
            "block_actions" => {
                let raw: RawBlockActions = serde_json::from_value(payload)
                    .map_err(|error| EventParseError::malformed("block_actions", error))?;
                Ok(raw
                    .into_event()
                    .map(Self::BlockAction)
                    .unwrap_or_else(|| Self::Unsupported { event_type: kind.clone() }))
            }
            _ => Ok(Self::Unsupported { event_type: kind }),
        }
    }

    /// Events API callbacks carry no workflow step, so they are only labelled.
    pub fn from_event_callback(payload: &Value) -> Self {
        let inner = payload
            .get("event")
            .and_then(|event| event.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        Self::Unsupported { event_type: format!("events_api:{inner}") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    ViewSubmission,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteKey {
    Command(String),
    View(String),
    Action(String),
}

impl RouteKey {
    pub fn command(name: &str) -> Self {
        Self::Command(name.trim().to_ascii_lowercase())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ViewStateValue {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub callback_id: String,
    pub values: BTreeMap<String, BTreeMap<String, ViewStateValue>>,
}

impl ViewSubmissionEvent {
    fn state(&self, block_id: &str, action_id: &str) -> Option<&ViewStateValue> {
        self.values.get(block_id).and_then(|actions| actions.get(action_id))
    }

    pub fn selected_value(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.state(block_id, action_id)
            .and_then(|state| state.selected_option.as_ref())
            .map(|option| option.value.as_str())
    }

    pub fn input_value(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.state(block_id, action_id).and_then(|state| state.value.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: Option<String>,
    pub message_ts: Option<String>,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
}

impl EventParseError {
    fn malformed(kind: &str, error: impl std::fmt::Display) -> Self {
        Self::Malformed { kind: kind.to_owned(), reason: error.to_string() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("directory lookup failed: {0}")]
    Directory(#[source] SlackApiError),
    #[error("approval form could not be opened: {0}")]
    OpenView(#[source] SlackApiError),
    #[error("message delivery failed: {0}")]
    Delivery(#[source] SlackApiError),
    #[error("original message could not be updated: {0}")]
    Update(#[source] SlackApiError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("no eligible approvers for requester `{requester_id}`")]
    NoEligibleApprovers { requester_id: String },
    #[error("malformed form submission: {0}")]
    MalformedSubmission(String),
    #[error("block action `{action_id}` carried no value")]
    MissingActionValue { action_id: String },
    #[error("block action `{action_id}` has no channel/message reference")]
    MissingMessageReference { action_id: String },
    #[error("unrecognised decision action `{0}`")]
    UnknownAction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn routes(&self) -> Vec<RouteKey>;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Route table from command, form and action identifiers to handlers.
/// Read-only once built.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<RouteKey, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        for route in handler.routes() {
            self.handlers.insert(route, Arc::clone(&handler));
        }
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = envelope.event.route_key().and_then(|key| self.handlers.get(&key))
        else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn route_count(&self) -> usize {
        self.handlers.len()
    }
}

/// The three-step approval workflow wired onto `command`.
pub fn approval_dispatcher(api: Arc<dyn SlackApi>, command: &str) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ApprovalCommandHandler::new(Arc::clone(&api), command));
    dispatcher.register(SubmissionHandler::new(Arc::clone(&api)));
    dispatcher.register(DecisionHandler::new(api));
    dispatcher
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawViewSubmission {
    user: RawUser,
    view: RawView,
}

#[derive(Deserialize)]
struct RawView {
    callback_id: String,
    #[serde(default)]
    state: RawViewState,
}

#[derive(Default, Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: BTreeMap<String, BTreeMap<String, ViewStateValue>>,
}

impl From<RawViewSubmission> for ViewSubmissionEvent {
    fn from(raw: RawViewSubmission) -> Self {
        Self {
            user_id: raw.user.id,
            callback_id: raw.view.callback_id,
            values: raw.view.state.values,
        }
    }
}

#[derive(Deserialize)]
struct RawBlockActions {
    user: RawUser,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Deserialize)]
struct RawMessage {
    ts: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

impl RawBlockActions {
    fn into_event(self) -> Option<BlockActionEvent> {
        let action = self.actions.into_iter().next()?;
        Some(BlockActionEvent {
            channel_id: self.channel.map(|channel| channel.id),
            message_ts: self.message.map(|message| message.ts),
            user_id: self.user.id,
            action_id: action.action_id,
            value: action.value,
        })
    }
}
