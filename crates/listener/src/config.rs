use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LISTENER_PORT: u16 = 8080;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Never print the password, even in debug logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Management endpoint of the virtualization cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub host: String,
    pub port: u16,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Only overridden by tests that talk to a plain-HTTP mock backend.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

impl ClusterConfig {
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            scheme: default_scheme(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// Backend API paths and naming used when managing the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhookSettings {
    pub list_path: String,
    pub create_path: String,
    /// The subscription uuid is appended to this path.
    pub update_path: String,
    /// `{uuid}` is substituted with the subscription uuid.
    pub get_path: String,
    /// `{uuid}` is substituted with the subscription uuid.
    pub delete_path: String,
    pub current_user_path: String,
    pub callback_path: String,
    pub name_prefix: String,
    pub kind: String,
    pub api_version: String,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            list_path: "/api/nutanix/v3/webhooks/list".to_string(),
            create_path: "/api/nutanix/v3/webhooks".to_string(),
            update_path: "/api/nutanix/v3/webhooks/".to_string(),
            get_path: "/api/nutanix/v3/webhooks/{uuid}".to_string(),
            delete_path: "/api/nutanix/v3/webhooks/{uuid}".to_string(),
            current_user_path: "/api/nutanix/v3/users/me".to_string(),
            callback_path: "/listener/callback".to_string(),
            name_prefix: "Nutanix_Listener_Webhook_".to_string(),
            kind: "webhook".to_string(),
            api_version: "3.0".to_string(),
        }
    }
}

impl WebhookSettings {
    pub fn get_path_for(&self, uuid: &str) -> String {
        self.get_path.replacen("{uuid}", uuid, 1)
    }

    pub fn delete_path_for(&self, uuid: &str) -> String {
        self.delete_path.replacen("{uuid}", uuid, 1)
    }

    pub fn update_path_for(&self, uuid: &str) -> String {
        format!("{}{}", self.update_path, uuid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub cluster: ClusterConfig,
    /// Local port the dispatch runtime listens on; defaults to 8080.
    #[serde(default)]
    pub listener_port: Option<u16>,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ListenerConfig {
    pub fn new(cluster: ClusterConfig) -> Self {
        Self {
            cluster,
            listener_port: None,
            webhook: WebhookSettings::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn with_listener_port(mut self, port: u16) -> Self {
        self.listener_port = Some(port);
        self
    }

    pub fn listener_port(&self) -> u16 {
        self.listener_port.unwrap_or(DEFAULT_LISTENER_PORT)
    }
}
