use std::{sync::Arc, time::Duration};

use signoff_core::config::{AppConfig, ConfigError};
use signoff_slack::{
    api::{SlackApiError, WebApiClient},
    approval_dispatcher,
    events::EventDispatcher,
    signature::RequestVerifier,
    socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<EventDispatcher>,
    /// Present when Socket Mode delivery is enabled.
    pub slack_runner: Option<SocketModeRunner>,
    /// Present when a signing secret allows HTTP delivery.
    pub request_verifier: Option<Arc<RequestVerifier>>,
}

impl Application {
    pub fn transport_label(&self) -> &'static str {
        match (self.slack_runner.is_some(), self.request_verifier.is_some()) {
            (true, true) => "socket+http",
            (true, false) => "socket",
            (false, true) => "http",
            (false, false) => "none",
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack web api client could not be built: {0}")]
    SlackClient(#[source] SlackApiError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;
    let client = Arc::new(
        WebApiClient::new(
            config.slack.api_base_url.clone(),
            config.slack.bot_token.clone(),
            Duration::from_secs(config.slack.api_timeout_secs),
        )
        .map_err(BootstrapError::SlackClient)?,
    );
    let dispatcher = Arc::new(approval_dispatcher(client.clone(), &config.slack.command));
    info!(
        event_name = "system.bootstrap.routes_registered",
        correlation_id = "bootstrap",
        command = %config.slack.command,
        routes = dispatcher.route_count(),
        "approval workflow routes registered"
    );

    let slack_runner = config.slack.socket_mode.then(|| {
        SocketModeRunner::new(
            Arc::new(WebSocketTransport::new(client, config.slack.app_token.clone())),
            Arc::clone(&dispatcher),
            ReconnectPolicy::default(),
        )
    });

    let request_verifier = if config.http_ingress_enabled() {
        config.slack.signing_secret.clone().map(|secret| Arc::new(RequestVerifier::new(secret)))
    } else {
        None
    };

    Ok(Application { config, dispatcher, slack_runner, request_verifier })
}
