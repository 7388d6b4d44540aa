use anyhow::{Context, Result};
use listener::{EventType, ListenerConfig};
use serde::Deserialize;
use std::path::Path;

/// Consumer configuration file (TOML).
///
/// ```toml
/// events = ["VM.ON", "VM.OFF"]
///
/// [listener]
/// listener_port = 8080
///
/// [listener.cluster]
/// host = "10.0.0.10"
/// port = 9440
/// username = "admin"
/// password = "secret"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConsumerConfig {
    pub(crate) listener: ListenerConfig,
    #[serde(default = "default_events")]
    pub(crate) events: Vec<EventType>,
}

fn default_events() -> Vec<EventType> {
    vec![EventType::VmOn, EventType::VmOff]
}

impl ConsumerConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub(crate) fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}
