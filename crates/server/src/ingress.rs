use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use signoff_core::InterfaceError;
use signoff_slack::{
    commands::SlashCommandPayload,
    events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent},
    signature::RequestVerifier,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Clone)]
pub struct IngressState {
    dispatcher: Arc<EventDispatcher>,
    verifier: Arc<RequestVerifier>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngressError {
    pub error: &'static str,
    pub correlation_id: String,
}

type Rejection = (StatusCode, Json<IngressError>);

/// Webhook delivery for Slack apps not using Socket Mode.
pub fn router(dispatcher: Arc<EventDispatcher>, verifier: Arc<RequestVerifier>) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/interactive", post(interactive))
        .route("/slack/commands", post(commands))
        .with_state(IngressState { dispatcher, verifier })
}

impl IngressState {
    fn authenticate(&self, headers: &HeaderMap, body: &[u8]) -> Result<String, Rejection> {
        let correlation_id = Uuid::new_v4().to_string();

        self.verifier
            .verify(
                header_value(headers, TIMESTAMP_HEADER),
                header_value(headers, SIGNATURE_HEADER),
                body,
                Utc::now().timestamp(),
            )
            .map_err(|error| reject(InterfaceError::unauthorized(error.to_string(), &correlation_id)))?;

        Ok(correlation_id)
    }

    /// Slack wants an answer within three seconds, so work runs after the response.
    fn spawn_dispatch(&self, event: SlackEvent, correlation_id: String) {
        let dispatcher = Arc::clone(&self.dispatcher);
        info!(
            event_name = "ingress.slack.request_accepted",
            correlation_id = %correlation_id,
            event_type = ?event.event_type(),
            "accepted slack http request"
        );

        tokio::spawn(async move {
            let envelope = SlackEnvelope { envelope_id: correlation_id.clone(), event };
            let context = EventContext { correlation_id };
            match dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Processed) => {}
                Ok(HandlerResult::Ignored) => debug!(
                    correlation_id = %context.correlation_id,
                    "no route for slack http request"
                ),
                Err(error) => warn!(
                    event_name = "workflow.approval.step_failed",
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "event dispatch failed"
                ),
            }
        });
    }
}

async fn events(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Rejection> {
    let correlation_id = state.authenticate(&headers, &body)?;
    let payload: Value = serde_json::from_slice(&body).map_err(|error| {
        reject(InterfaceError::bad_request(format!("event body is not json: {error}"), &correlation_id))
    })?;

    if payload.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = payload.get("challenge").and_then(Value::as_str).ok_or_else(|| {
            reject(InterfaceError::bad_request("url_verification without challenge", &correlation_id))
        })?;
        return Ok(challenge.to_owned().into_response());
    }

    state.spawn_dispatch(SlackEvent::from_event_callback(&payload), correlation_id);
    Ok(StatusCode::OK.into_response())
}

async fn interactive(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, Rejection> {
    let correlation_id = state.authenticate(&headers, &body)?;
    let raw = url::form_urlencoded::parse(&body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            reject(InterfaceError::bad_request("missing `payload` form field", &correlation_id))
        })?;
    let event = SlackEvent::from_interactive_payload(&raw)
        .map_err(|error| reject(InterfaceError::bad_request(error.to_string(), &correlation_id)))?;

    state.spawn_dispatch(event, correlation_id);
    Ok(StatusCode::OK)
}

async fn commands(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, Rejection> {
    let correlation_id = state.authenticate(&headers, &body)?;
    let fields: Map<String, Value> = url::form_urlencoded::parse(&body)
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect();
    let payload: SlashCommandPayload = serde_json::from_value(Value::Object(fields))
        .map_err(|error| reject(InterfaceError::bad_request(error.to_string(), &correlation_id)))?;

    state.spawn_dispatch(SlackEvent::SlashCommand(payload), correlation_id);
    Ok(StatusCode::OK)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn reject(error: InterfaceError) -> Rejection {
    warn!(
        event_name = "ingress.slack.request_rejected",
        correlation_id = %error.correlation_id(),
        error = %error,
        "rejected slack http request"
    );
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(IngressError {
            error: error.user_message(),
            correlation_id: error.correlation_id().to_owned(),
        }),
    )
}
