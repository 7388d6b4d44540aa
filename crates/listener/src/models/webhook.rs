use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionState {
    Pending,
    Complete,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Subscription as held by the cluster backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub status: WebhookStatus,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub spec: WebhookSpec,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub api_version: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub metadata: WebhookMetadata,
}

impl Webhook {
    pub fn uuid(&self) -> Option<&str> {
        self.metadata.uuid.as_deref().filter(|uuid| !uuid.is_empty())
    }

    pub fn post_url(&self) -> &str {
        &self.spec.resources.post_url
    }

    pub fn events(&self) -> &[String] {
        &self.spec.resources.events_filter_list
    }

    pub fn state(&self) -> SubscriptionState {
        self.status.state
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookStatus {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub state: SubscriptionState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookSpec {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub resources: WebhookResources,
    #[serde(
        default,
        deserialize_with = "super::null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookResources {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub post_url: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub events_filter_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub spec_version: u64,
}

/// Body of the list call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookListRequest {
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookList {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub api_version: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub metadata: WebhookListMetadata,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub entities: Vec<Webhook>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookListMetadata {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub total_matches: u64,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub length: u64,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub offset: u64,
}

/// Body of the create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub metadata: WebhookRequestMetadata,
    pub spec: WebhookSpec,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequestMetadata {
    pub kind: String,
    pub spec_version: u64,
}
