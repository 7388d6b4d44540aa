//! Keeps a network appliance in step with VM lifecycle events on a
//! virtualization cluster.
//!
//! The listener registers an HTTP callback (webhook) with the cluster
//! management API and hands every pushed event to an [`EventHandler`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod listener;
pub mod models;
pub mod preflight;
pub mod reconciler;

pub use config::{ClusterConfig, Credentials, ListenerConfig, WebhookSettings};
pub use dispatch::{EventHandler, ListenerStatus, RuntimeState};
pub use error::{ListenerError, Result};
pub use listener::WebhooksListener;
pub use models::event::{Event, EventType};
pub use reconciler::{remove_duplicates, WebhookReconciler};
