//! maintpilot service binary.
//!
//! Wires the components together in a fixed order: configuration, then
//! collaborators, then the copilot service, then the webhook delivery
//! substrate. `serve` runs the agent loop until SIGTERM/Ctrl+C; `replay`
//! feeds a single event JSON file through reasoning and execution offline
//! and prints the resulting actions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maintpilot_agent::{
    CopilotService, MockLlm, MockNotifier, MockTicketing, Notification, NotificationProvider,
};
use maintpilot_core::{Config, Event};
use maintpilot_delivery::{DeliveryService, WebhookEvent};

/// Notification collaborator that fans alerts out to registered webhook
/// endpoints. This is where the agent side meets the delivery substrate;
/// chat/ticketing integrations plug in the same way.
struct WebhookNotifier {
    delivery: Arc<DeliveryService>,
}

#[async_trait::async_trait]
impl NotificationProvider for WebhookNotifier {
    async fn send(
        &self,
        notification: Notification,
    ) -> maintpilot_core::Result<serde_json::Map<String, serde_json::Value>> {
        let mut payload = serde_json::Map::new();
        payload.insert("message".into(), notification.message.clone().into());
        payload.insert(
            "priority".into(),
            notification.priority.as_str().to_string().into(),
        );
        payload.insert(
            "channels".into(),
            serde_json::Value::Array(
                notification
                    .channels
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
        );

        let results = self
            .delivery
            .trigger(WebhookEvent::AlertCreated, &notification.tenant_id, payload)
            .await;

        let mut receipt = serde_json::Map::new();
        receipt.insert("status".into(), "sent".into());
        receipt.insert("channels".into(), serde_json::json!(notification.channels));
        receipt.insert("webhook_deliveries".into(), serde_json::json!(results.len()));
        Ok(receipt)
    }
}

#[derive(Debug, Parser)]
#[clap(name = "maintpilot", version, about = "Predictive-maintenance decision agent")]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/maintpilot.yaml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "MAINTPILOT_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "MAINTPILOT_LOG_JSON", global = true)]
    log_json: bool,

    /// Use mock collaborators and mocked webhook delivery
    #[clap(long, global = true)]
    dry_run: bool,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the agent service (default if no subcommand given)
    Serve,
    /// Feed an event JSON file through the copilot offline and print the
    /// resulting actions
    Replay {
        /// Event file path (JSON)
        #[clap(long)]
        event_file: PathBuf,

        /// Output actions as JSON only
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!("Starting maintpilot v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Replay { ref event_file, json }) => {
            run_replay_command(&cli, event_file, json).await
        }
        Some(Commands::Serve) | None => run_serve_command(&cli).await,
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    if cli.config.exists() {
        info!("Loading configuration from: {:?}", cli.config);
        Config::from_file(&cli.config).context("Failed to load configuration")
    } else {
        info!(
            "Configuration file {:?} not found, using defaults with environment overrides",
            cli.config
        );
        Ok(Config::from_env())
    }
}

async fn run_serve_command(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let delivery = if cli.dry_run {
        info!("Dry run mode - webhook deliveries will be mocked");
        Arc::new(DeliveryService::mocked(config.delivery.clone()))
    } else {
        Arc::new(DeliveryService::new(config.delivery.clone()))
    };

    let service = if cli.dry_run {
        CopilotService::new(
            &config,
            Some(Arc::new(MockLlm)),
            Some(Arc::new(MockTicketing)),
            Some(Arc::new(MockNotifier)),
        )
    } else {
        // real LLM/ticketing integrations plug in here; notifications fan
        // out through the webhook substrate
        CopilotService::new(
            &config,
            None,
            None,
            Some(Arc::new(WebhookNotifier {
                delivery: delivery.clone(),
            })),
        )
    };

    service.start().await;
    info!("maintpilot is running, waiting for events");

    shutdown_signal().await;

    service.stop().await;
    info!("maintpilot stopped");
    Ok(())
}

async fn run_replay_command(cli: &Cli, event_file: &PathBuf, json_output: bool) -> Result<()> {
    let config = load_config(cli)?;

    let content = std::fs::read_to_string(event_file).context("Failed to read event file")?;
    let event: Event = serde_json::from_str(&content).context("Failed to parse event JSON")?;

    info!(
        event_id = %event.id,
        kind = %event.kind,
        asset_id = %event.asset_id,
        "Replaying event through the copilot"
    );

    // replay always uses mock collaborators, never real side effects
    let service = CopilotService::new(
        &config,
        Some(Arc::new(MockLlm)),
        Some(Arc::new(MockTicketing)),
        Some(Arc::new(MockNotifier)),
    );
    let copilot = service.copilot();

    copilot.memory().add_event(event.clone());
    let mut actions = copilot.reason(&event).await;
    for action in &mut actions {
        copilot
            .act(action)
            .await
            .map_err(|e| anyhow::anyhow!("action execution failed: {e}"))?;
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&actions)?);
    } else {
        println!("\n{}", "=".repeat(70));
        println!("REPLAY RESULT");
        println!("{}", "=".repeat(70));
        println!("Event:     {} ({})", event.id, event.kind);
        println!("Asset:     {}", event.asset_id);
        println!("Actions:   {}", actions.len());
        println!();
        for action in &actions {
            let status = action
                .result
                .as_ref()
                .and_then(|r| r.get("status"))
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            println!("  [{}] {} - {}", status, action.kind, action.description);
        }
        println!("{}", "=".repeat(70));
        println!("{}", serde_json::to_string_pretty(&actions)?);
    }

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down..."); },
        _ = terminate => { info!("Received SIGTERM, shutting down..."); },
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .context("Invalid log level")?;

    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    }

    Ok(())
}
