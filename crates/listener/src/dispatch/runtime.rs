use super::status::{ListenerStatus, StatusReporter};
use super::EventHandler;
use crate::error::Result;
use crate::models::event::Event;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use log::{debug, error, info};
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    NotStarted,
    Listening,
    ClosedWithError,
    ClosedClean,
}

async fn receive_event(body: web::Bytes, handler: web::Data<dyn EventHandler>) -> HttpResponse {
    info!("Received event");
    debug!("Event data: {}", String::from_utf8_lossy(&body));

    let event: Event = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Failed to decode event, dropping it: {e}");
            return HttpResponse::Ok().finish();
        }
    };

    let event_type = event.event_type;
    if let Err(e) = handler.on_event(event).await {
        error!("Event handler failed on {event_type} event: {e:#}");
    }
    HttpResponse::Ok().finish()
}

pub(crate) fn configure_callback(cfg: &mut web::ServiceConfig, callback_path: &str) {
    cfg.route(callback_path, web::post().to(receive_event));
}

/// HTTP endpoint that receives pushed events and hands each one to the
/// registered [`EventHandler`].
///
/// Runs until the server fails or `shutdown` is cancelled. Every run ends
/// with [`ListenerStatus::Closed`] followed by the end of the status channel.
pub struct DispatchRuntime {
    port: u16,
    callback_path: String,
    handler: Arc<dyn EventHandler>,
    reporter: StatusReporter,
    state: RuntimeState,
}

impl DispatchRuntime {
    pub fn new(
        port: u16,
        callback_path: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        reporter: StatusReporter,
    ) -> Self {
        Self {
            port,
            callback_path: callback_path.into(),
            handler,
            reporter,
            state: RuntimeState::NotStarted,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    fn transition(&mut self, next: RuntimeState) {
        debug!("Dispatch runtime {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> RuntimeState {
        self.transition(RuntimeState::Listening);
        self.reporter.publish(ListenerStatus::Starting).await;

        let handler = web::Data::from(self.handler.clone());
        let callback_path = self.callback_path.clone();
        let bound = HttpServer::new(move || {
            let callback_path = callback_path.clone();
            App::new()
                .app_data(handler.clone())
                .wrap(middleware::Logger::default())
                .configure(move |cfg| configure_callback(cfg, &callback_path))
        })
        .disable_signals()
        .bind(("0.0.0.0", self.port));

        let server = match bound {
            Ok(server) => server.run(),
            Err(e) => {
                error!("Listener error: failed to bind port {}: {e}", self.port);
                return self.terminate(Some(e.to_string())).await;
            }
        };
        info!(
            "Listening for events on port {} at {}",
            self.port, self.callback_path
        );

        let server_handle = server.handle();
        let stopper = actix_web::rt::spawn(async move {
            shutdown.cancelled().await;
            info!("Shutdown requested, stopping listener");
            server_handle.stop(true).await;
        });

        let result = server.await;
        stopper.abort();

        match result {
            Ok(()) => self.terminate(None).await,
            Err(e) => {
                error!("Listener error: {e}");
                self.terminate(Some(e.to_string())).await
            }
        }
    }

    async fn terminate(mut self, error: Option<String>) -> RuntimeState {
        let final_state = match error {
            Some(msg) => {
                self.reporter.publish(ListenerStatus::Error(msg)).await;
                RuntimeState::ClosedWithError
            }
            None => RuntimeState::ClosedClean,
        };
        self.transition(final_state);
        self.reporter.close().await;
        final_state
    }

    /// Runs the runtime on its own thread with a dedicated actix system.
    /// The caller learns about termination through the status channel.
    pub fn spawn(self, shutdown: CancellationToken) -> Result<thread::JoinHandle<RuntimeState>> {
        let handle = thread::Builder::new()
            .name("dispatch-runtime".to_string())
            .spawn(move || actix_web::rt::System::new().block_on(self.run(shutdown)))?;
        Ok(handle)
    }
}
