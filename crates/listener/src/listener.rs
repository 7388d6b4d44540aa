use crate::config::ListenerConfig;
use crate::dispatch::{status_channel, DispatchRuntime, EventHandler, ListenerStatus, RuntimeState};
use crate::error::{ListenerError, Result};
use crate::http::{ApiRequest, RequestExecutor};
use crate::models::event::EventType;
use crate::preflight::{check_outbound_connectivity, check_port_availability};
use crate::reconciler::WebhookReconciler;
use log::{error, info};
use reqwest::{Method, StatusCode};
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Entry point for event consumers.
///
/// `initialize` validates the cluster (reachability and credentials),
/// `register_for_events` subscribes and starts the dispatch runtime.
pub struct WebhooksListener {
    config: ListenerConfig,
    executor: RequestExecutor,
    local_ip: IpAddr,
    runtime: Option<RunningRuntime>,
}

struct RunningRuntime {
    handle: JoinHandle<RuntimeState>,
    shutdown: CancellationToken,
}

impl WebhooksListener {
    pub async fn initialize(config: ListenerConfig) -> Result<Self> {
        info!("Initializing listener");
        let executor = RequestExecutor::new(
            config.cluster.credentials.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        info!("Verifying connectivity with cluster");
        let local_ip = check_outbound_connectivity(&config.cluster.host, config.cluster.port)
            .await
            .map_err(|e| {
                error!("Failed to verify connectivity with cluster: {e}");
                e
            })?;

        info!("Authenticating cluster credentials");
        let url = config.cluster.url(&config.webhook.current_user_path);
        match executor.execute(ApiRequest::new(Method::GET, url)).await {
            Ok(response) if response.status == StatusCode::OK => {}
            Ok(response) => {
                error!(
                    "Error verifying cluster credentials, HTTP status {}",
                    response.status
                );
                return Err(ListenerError::Authentication {
                    status: response.status.as_u16(),
                });
            }
            Err(ListenerError::Request { status, .. }) => {
                error!("Unable to log in to cluster with given credentials, HTTP status {status}");
                return Err(ListenerError::Authentication { status });
            }
            Err(e) => {
                error!("Unable to log in to cluster: {e}");
                return Err(e);
            }
        }

        Ok(Self {
            config,
            executor,
            local_ip,
            runtime: None,
        })
    }

    pub fn local_ip(&self) -> IpAddr {
        self.local_ip
    }

    pub fn listener_port(&self) -> u16 {
        self.config.listener_port()
    }

    pub fn callback_url(&self) -> String {
        self.reconciler().callback_url()
    }

    pub fn reconciler(&self) -> WebhookReconciler {
        WebhookReconciler::new(
            self.executor.clone(),
            self.config.cluster.clone(),
            self.config.webhook.clone(),
            self.local_ip,
            self.listener_port(),
        )
    }

    /// Subscribes to `events` and starts serving them to `handler`.
    ///
    /// Nothing is served unless the port is free and the subscription was
    /// created or updated. Runtime failures after that point only show up on
    /// the returned status channel.
    pub async fn register_for_events(
        &mut self,
        events: &[EventType],
        handler: Arc<dyn EventHandler>,
    ) -> Result<mpsc::Receiver<ListenerStatus>> {
        if self.runtime.is_some() {
            return Err(ListenerError::AlreadyRegistered);
        }

        let port = self.listener_port();
        check_port_availability(port)?;

        self.reconciler()
            .ensure_subscription(events)
            .await
            .map_err(|e| {
                error!("Failed to register: {e}");
                e
            })?;

        let (reporter, status) = status_channel();
        let runtime = DispatchRuntime::new(
            port,
            self.config.webhook.callback_path.clone(),
            handler,
            reporter,
        );
        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(shutdown.clone())?;
        self.runtime = Some(RunningRuntime { handle, shutdown });
        Ok(status)
    }

    /// Removes this listener's subscription from the cluster.
    pub async fn unregister(&self) -> Result<bool> {
        self.reconciler().delete_subscription().await
    }

    /// Stops the dispatch runtime and waits for it to finish. The listener
    /// can register again afterwards.
    pub async fn shutdown(&mut self) -> Option<RuntimeState> {
        let RunningRuntime { handle, shutdown } = self.runtime.take()?;
        shutdown.cancel();
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(state)) => Some(state),
            _ => {
                error!("Dispatch runtime terminated abnormally");
                None
            }
        }
    }
}
