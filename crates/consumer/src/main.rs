mod config;
mod handler;

use anyhow::{Context, Result};
use clap::Parser;
use config::ConsumerConfig;
use handler::LoggingEventHandler;
use listener::{EventType, WebhooksListener};
use log::{debug, error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about = "Receives VM lifecycle events from the cluster", long_about = None)]
struct Args {
    /// Path to the consumer TOML config
    #[arg(short = 'c', long, default_value = "consumer.toml")]
    config: PathBuf,

    /// Local port for the event callback, overrides the config file
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Events to subscribe to, overrides the config file (e.g. VM.ON,VM.OFF)
    #[arg(short = 'e', long, value_delimiter = ',')]
    events: Vec<EventType>,

    /// Remove this listener's webhook from the cluster and exit
    #[arg(long)]
    unregister: bool,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

// Cancels the token on the first termination-type signal.
fn cancel_on_signal(cancellation_token: CancellationToken) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received termination signal"),
            _ = sigint.recv() => info!("Received interrupt signal"),
            _ = sighup.recv() => info!("Received hangup signal"),
        }
        cancellation_token.cancel();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    debug!("Log level: {log_level}");

    let mut config = ConsumerConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.listener.listener_port = Some(port);
    }
    if !args.events.is_empty() {
        config.events = args.events;
    }

    let mut listener = WebhooksListener::initialize(config.listener)
        .await
        .context("Failed to initialize listener")?;

    if args.unregister {
        if listener.unregister().await? {
            info!("Webhook for {} removed", listener.callback_url());
        } else {
            info!("No webhook registered for {}", listener.callback_url());
        }
        return Ok(());
    }

    let cancellation_token = CancellationToken::new();
    cancel_on_signal(cancellation_token.clone())?;

    let mut status = listener
        .register_for_events(&config.events, Arc::new(LoggingEventHandler))
        .await
        .context("Failed to register for events")?;
    info!("Listening for events at {}", listener.callback_url());

    loop {
        tokio::select! {
            message = status.recv() => match message {
                Some(message) => info!("Message from listener: {message}"),
                None => {
                    error!("Listener closed, exiting");
                    break;
                }
            },
            _ = cancellation_token.cancelled() => {
                info!("Received cancellation request");
                let final_state = listener.shutdown().await;
                while let Some(message) = status.recv().await {
                    info!("Message from listener: {message}");
                }
                debug!("Dispatch runtime finished in state {final_state:?}");
                break;
            }
        }
    }

    Ok(())
}
