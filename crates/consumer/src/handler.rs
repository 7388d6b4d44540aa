use anyhow::Result;
use async_trait::async_trait;
use listener::{Event, EventHandler};
use log::info;

/// Logs every VM lifecycle event it receives. Real appliance integrations
/// replace this with their own [`EventHandler`].
pub(crate) struct LoggingEventHandler;

pub(crate) fn describe(event: &Event) -> String {
    let mut categories: Vec<String> = event
        .categories()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    categories.sort();

    format!(
        "{} vm={} ip={} categories=[{}]",
        event.event_type,
        event.entity_name(),
        event.primary_ip().unwrap_or("-"),
        categories.join(",")
    )
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_event(&self, event: Event) -> Result<()> {
        info!("Received event: {}", describe(&event));
        Ok(())
    }
}
