use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle notifications a virtual machine can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "VM.CREATE")]
    VmCreate,
    #[serde(rename = "VM.DELETE")]
    VmDelete,
    #[serde(rename = "VM.ON")]
    VmOn,
    #[serde(rename = "VM.OFF")]
    VmOff,
    #[serde(rename = "VM.UPDATE")]
    VmUpdate,
    #[serde(rename = "VM.MIGRATE")]
    VmMigrate,
    #[serde(rename = "VM.NIC_PLUG")]
    VmNicPlug,
    #[serde(rename = "VM.NIC_UNPLUG")]
    VmNicUnplug,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::VmCreate,
        EventType::VmDelete,
        EventType::VmOn,
        EventType::VmOff,
        EventType::VmUpdate,
        EventType::VmMigrate,
        EventType::VmNicPlug,
        EventType::VmNicUnplug,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::VmCreate => "VM.CREATE",
            EventType::VmDelete => "VM.DELETE",
            EventType::VmOn => "VM.ON",
            EventType::VmOff => "VM.OFF",
            EventType::VmUpdate => "VM.UPDATE",
            EventType::VmMigrate => "VM.MIGRATE",
            EventType::VmNicPlug => "VM.NIC_PLUG",
            EventType::VmNicUnplug => "VM.NIC_UNPLUG",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|event_type| event_type.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown event type: {s}"))
    }
}

/// Notification pushed by the cluster to the listener callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub entity_reference: EntityReference,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub data: EventData,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub metadata: EntityMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub status: EntityStatus,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub api_version: String,
    /// Nested `metadata` object of the entity (categories, ownership).
    #[serde(default, deserialize_with = "super::null_as_default", rename = "metadata")]
    pub entity: EntityInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatus {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub resources: EntityResources,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityResources {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub nic_list: Vec<Nic>,
    #[serde(default)]
    pub host_reference: Option<EntityReference>,
    #[serde(default)]
    pub hypervisor_type: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub num_sockets: Option<u32>,
    #[serde(default)]
    pub num_vcpus_per_socket: Option<u32>,
    #[serde(default)]
    pub memory_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub ip_endpoint_list: Vec<IpEndpoint>,
    #[serde(default)]
    pub network_reference: Option<EntityReference>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpEndpoint {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub uuid: String,
    #[serde(default)]
    pub entity_version: Option<i64>,
    #[serde(default)]
    pub owner_reference: Option<OwnerReference>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub categories: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerReference {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub uuid: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub name: String,
}

impl Event {
    pub fn entity_name(&self) -> &str {
        &self.data.metadata.status.name
    }

    /// First IP of the first NIC, if the VM reported any.
    pub fn primary_ip(&self) -> Option<&str> {
        self.data
            .metadata
            .status
            .resources
            .nic_list
            .first()?
            .ip_endpoint_list
            .iter()
            .map(|endpoint| endpoint.ip.as_str())
            .find(|ip| !ip.is_empty())
    }

    pub fn categories(&self) -> &HashMap<String, String> {
        &self.data.metadata.entity.categories
    }
}
