//! Device types for tracking discovered network equipment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

use crate::interface::InterfaceId;

/// Durable identifier for a device in the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Coarse device role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Router,
    Switch,
    Firewall,
    #[default]
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceType::Router => "router",
            DeviceType::Switch => "switch",
            DeviceType::Firewall => "firewall",
            DeviceType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Current status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device answered every discovery step
    Online,
    /// Device was seen but is not currently responding
    Offline,
    /// Device answered the identity probe but some optional steps failed
    Degraded,
    /// Device status is unknown
    #[default]
    Unknown,
}

/// Identity attributes read from a device during a probe
///
/// `device_type` comes from a keyword heuristic over the description and
/// must not be treated as authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_id: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub uptime_secs: Option<u64>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub device_type: DeviceType,
}

/// A device in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Human-readable name (sysName, or the address when unnamed)
    pub name: String,
    /// Address the device is managed through; unique in the inventory
    pub management_address: IpAddr,
    pub device_type: DeviceType,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub object_id: Option<String>,
    pub status: DeviceStatus,
    pub uptime_secs: Option<u64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Owned interfaces, in the order they were first discovered
    pub interfaces: Vec<InterfaceId>,
}

impl Device {
    /// Create a new device with minimal information
    pub fn new(name: String, management_address: IpAddr) -> Self {
        let now = Utc::now();
        Self {
            id: DeviceId::new(),
            name,
            management_address,
            device_type: DeviceType::Unknown,
            vendor: None,
            model: None,
            os_version: None,
            description: None,
            location: None,
            contact: None,
            object_id: None,
            status: DeviceStatus::Unknown,
            uptime_secs: None,
            first_seen: now,
            last_seen: now,
            interfaces: Vec::new(),
        }
    }

    /// Create a device from its first successful probe
    pub fn from_identity(management_address: IpAddr, identity: &DeviceIdentity) -> Self {
        let name = non_empty(&identity.name).unwrap_or_else(|| management_address.to_string());
        let mut device = Self::new(name, management_address);
        device.apply_identity(identity);
        device
    }

    /// Fold a fresh probe into this record
    ///
    /// Only non-empty values overwrite; fields the probe left empty keep
    /// whatever was curated before. The heuristic device type only fills an
    /// unknown type.
    pub fn apply_identity(&mut self, identity: &DeviceIdentity) {
        if let Some(name) = non_empty(&identity.name) {
            self.name = name;
        }
        overwrite(&mut self.description, &identity.description);
        overwrite(&mut self.location, &identity.location);
        overwrite(&mut self.contact, &identity.contact);
        overwrite(&mut self.object_id, &identity.object_id);
        overwrite(&mut self.vendor, &identity.vendor);
        overwrite(&mut self.model, &identity.model);
        overwrite(&mut self.os_version, &identity.os_version);
        if identity.uptime_secs.is_some() {
            self.uptime_secs = identity.uptime_secs;
        }
        if self.device_type == DeviceType::Unknown {
            self.device_type = identity.device_type;
        }
    }

    /// Update the last seen timestamp
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Check if the device has been seen recently
    pub fn is_stale(&self, timeout_secs: i64) -> bool {
        let elapsed = Utc::now() - self.last_seen;
        elapsed.num_seconds() > timeout_secs
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn overwrite(field: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = non_empty(incoming) {
        *field = Some(value);
    }
}
