use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::Mutex,
    task::{JoinError, JoinSet},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    api::WebApiClient,
    events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the transport was closed on purpose and will not reconnect.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs until the transport closes on purpose or retries run out, then
    /// waits for in-flight handlers to finish.
    pub async fn start(&self) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut attempt = 0;
        loop {
            let outcome = match self.connect(attempt).await {
                Ok(()) => {
                    attempt = 0;
                    self.pump(&mut in_flight).await
                }
                Err(error) => Err(error),
            };

            let Err(transport_error) = outcome else {
                break;
            };
            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "socket mode transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; continuing process without crash"
                );
                break;
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join_failure(joined);
        }
        Ok(())
    }

    async fn connect(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");
        Ok(())
    }

    /// Acks each envelope as soon as it arrives. Handlers run as separate
    /// tasks so a slow Slack call never holds back the next ack.
    async fn pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join_failure(joined);
            }

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                    warn!(
                        event_name = "workflow.approval.step_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            });
        }
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(error) = joined {
        warn!(
            event_name = "workflow.approval.step_failed",
            error = %error,
            "event handler task did not complete"
        );
    }
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Deserialize)]
struct SocketFrame {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Socket Mode over a real WebSocket, opened with the app-level token.
pub struct WebSocketTransport {
    client: Arc<WebApiClient>,
    app_token: SecretString,
    sink: Mutex<Option<SplitSink<SocketStream, Message>>>,
    stream: Mutex<Option<SplitStream<SocketStream>>>,
}

impl WebSocketTransport {
    pub fn new(client: Arc<WebApiClient>, app_token: SecretString) -> Self {
        Self { client, app_token, sink: Mutex::new(None), stream: Mutex::new(None) }
    }

    async fn open(&self) -> Result<(), TransportError> {
        let url = self
            .client
            .open_socket_connection(&self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (socket, _) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, stream) = socket.split();

        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn read_frame(&self) -> Result<Option<Message>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;
        stream.next().await.transpose().map_err(|error| TransportError::Receive(error.to_string()))
    }

    fn envelope_from_frame(frame: SocketFrame) -> Option<SlackEnvelope> {
        let envelope_id = frame.envelope_id?;
        let event = SlackEvent::from_socket_payload(&frame.kind, frame.payload).unwrap_or_else(
            |error| {
                warn!(
                    event_name = "ingress.slack.envelope_unparsed",
                    envelope_id = %envelope_id,
                    error = %error,
                    "unreadable socket mode payload"
                );
                SlackEvent::Unsupported { event_type: frame.kind.clone() }
            },
        );
        Some(SlackEnvelope { envelope_id, event })
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.open().await
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        loop {
            let Some(message) = self.read_frame().await? else {
                return Err(TransportError::Receive("socket stream ended".to_owned()));
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(TransportError::Receive(format!("socket closed by peer: {frame:?}")));
                }
                // Pings are answered by tungstenite itself.
                _ => continue,
            };

            let frame: SocketFrame = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(error = %error, "skipping unreadable socket mode frame");
                    continue;
                }
            };

            match frame.kind.as_str() {
                "hello" => debug!("socket mode hello received"),
                "disconnect" => {
                    info!(event_name = "ingress.slack.refresh_requested", "slack requested reconnect");
                    self.open().await?;
                }
                _ => {
                    if let Some(envelope) = Self::envelope_from_frame(frame) {
                        return Ok(Some(envelope));
                    }
                }
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink =
            guard.as_mut().ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        sink.send(Message::Text(json!({ "envelope_id": envelope_id }).to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stream.lock().await.take();
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
