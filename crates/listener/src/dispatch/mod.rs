use crate::models::event::Event;
use anyhow::Result;
use async_trait::async_trait;

mod runtime;
mod status;

pub use runtime::{DispatchRuntime, RuntimeState};
pub use status::{status_channel, ListenerStatus, StatusReporter, STATUS_CHANNEL_CAPACITY};

/// Application code plugged into the listener.
///
/// Called once per received event, concurrently for concurrent deliveries.
/// An error is logged by the runtime and does not affect later events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, event: Event) -> Result<()>;
}
