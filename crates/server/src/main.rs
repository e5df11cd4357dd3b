mod bootstrap;
mod health;
mod ingress;

use std::path::PathBuf;

use anyhow::Result;
use axum::Router;
use clap::Parser;
use signoff_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tracing::{error, info};

use crate::bootstrap::Application;

#[derive(Debug, Parser)]
#[command(
    name = "signoff-server",
    about = "Slack approval bot: request, notify approver, record the decision",
    after_help = "Examples:\n  signoff-server\n  signoff-server --config signoff.toml --log-level debug"
)]
struct Args {
    #[arg(long, help = "Path to a TOML config file (default: signoff.toml or config/signoff.toml)")]
    config: Option<PathBuf>,
    #[arg(long, help = "HTTP port for health and Slack webhook routes")]
    port: Option<u16>,
    #[arg(long, help = "Log level: trace, debug, info, warn or error")]
    log_level: Option<String>,
}

impl Args {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                log_level: self.log_level,
                port: self.port,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use signoff_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    spawn_http(&app).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport = app.transport_label(),
        command = %app.config.slack.command,
        "signoff-server started"
    );

    match app.slack_runner {
        Some(runner) => {
            tokio::select! {
                result = runner.start() => {
                    if let Err(error) = result {
                        error!(
                            event_name = "system.socket.stopped",
                            correlation_id = "socket",
                            error = %error,
                            "socket mode runner stopped"
                        );
                    }
                    wait_for_shutdown().await?;
                }
                result = wait_for_shutdown() => result?,
            }
        }
        None => wait_for_shutdown().await?,
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "signoff-server stopping"
    );
    Ok(())
}

fn http_router(app: &Application) -> Router {
    let router = health::router(app.transport_label());
    match &app.request_verifier {
        Some(verifier) => {
            router.merge(ingress::router(app.dispatcher.clone(), verifier.clone()))
        }
        None => router,
    }
}

async fn spawn_http(app: &Application) -> std::io::Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = http_router(app);

    info!(
        event_name = "system.http.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        slack_routes = app.request_verifier.is_some(),
        "http server started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            error!(
                event_name = "system.http.error",
                correlation_id = "bootstrap",
                error = %error,
                "http server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
