//! Interface types: raw table records and inventory entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

use crate::device::DeviceId;

/// Durable identifier for an interface in the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(pub Uuid);

impl InterfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InterfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interface type (IANAifType subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    Other,
    Ethernet,
    Loopback,
    Virtual,
    Wireless,
    Tunnel,
    Vlan,
    Aggregate,
    #[default]
    Unknown,
}

impl InterfaceType {
    /// Map an ifType code; unrecognised codes become `Unknown`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => InterfaceType::Other,
            6 | 62 | 69 | 117 => InterfaceType::Ethernet,
            24 => InterfaceType::Loopback,
            53 => InterfaceType::Virtual,
            71 => InterfaceType::Wireless,
            131 => InterfaceType::Tunnel,
            135 | 136 => InterfaceType::Vlan,
            161 => InterfaceType::Aggregate,
            _ => InterfaceType::Unknown,
        }
    }

    /// Types that do not correspond to a single physical port
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            InterfaceType::Virtual
                | InterfaceType::Tunnel
                | InterfaceType::Vlan
                | InterfaceType::Aggregate
                | InterfaceType::Loopback
        )
    }
}

/// Administrative or operational state of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceStatus {
    Up,
    Down,
    Testing,
    Dormant,
    NotPresent,
    LowerLayerDown,
    #[default]
    Unknown,
}

impl InterfaceStatus {
    /// Map an ifAdminStatus / ifOperStatus code; unrecognised codes become `Unknown`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => InterfaceStatus::Up,
            2 => InterfaceStatus::Down,
            3 => InterfaceStatus::Testing,
            5 => InterfaceStatus::Dormant,
            6 => InterfaceStatus::NotPresent,
            7 => InterfaceStatus::LowerLayerDown,
            _ => InterfaceStatus::Unknown,
        }
    }
}

/// One row of a device's interface table as read from the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub index: u32,
    pub name: String,
    pub description: Option<String>,
    pub if_type: InterfaceType,
    pub admin_status: InterfaceStatus,
    pub oper_status: InterfaceStatus,
    /// Bits per second, `None` when the device did not report it
    pub speed_bps: Option<u64>,
    pub mtu: Option<u32>,
    pub mac: Option<String>,
    pub ip: Option<IpAddr>,
    pub prefix_len: Option<u8>,
}

/// An interface owned by a device in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub device_id: DeviceId,
    /// Table index; `None` for interfaces only known from a neighbor report
    pub index: Option<u32>,
    pub name: String,
    pub description: Option<String>,
    pub if_type: InterfaceType,
    pub admin_status: InterfaceStatus,
    pub oper_status: InterfaceStatus,
    pub mac: Option<String>,
    pub ip: Option<IpAddr>,
    pub prefix_len: Option<u8>,
    pub speed_bps: Option<u64>,
    pub mtu: Option<u32>,
    pub last_seen: DateTime<Utc>,
}

impl Interface {
    /// Create an inventory interface from a discovered table row
    pub fn from_record(device_id: DeviceId, record: &InterfaceRecord) -> Self {
        let mut interface = Self::placeholder(device_id, &record.name);
        interface.apply_record(record);
        interface
    }

    /// Interface named by a neighbor report before its owner was walked
    pub fn placeholder(device_id: DeviceId, name: &str) -> Self {
        Self {
            id: InterfaceId::new(),
            device_id,
            index: None,
            name: name.to_string(),
            description: None,
            if_type: InterfaceType::Unknown,
            admin_status: InterfaceStatus::Unknown,
            oper_status: InterfaceStatus::Unknown,
            mac: None,
            ip: None,
            prefix_len: None,
            speed_bps: None,
            mtu: None,
            last_seen: Utc::now(),
        }
    }

    /// Overwrite discovered fields from a fresh table row
    pub fn apply_record(&mut self, record: &InterfaceRecord) {
        self.index = Some(record.index);
        self.name = record.name.clone();
        if record.description.is_some() {
            self.description = record.description.clone();
        }
        self.if_type = record.if_type;
        self.admin_status = record.admin_status;
        self.oper_status = record.oper_status;
        if record.mac.is_some() {
            self.mac = record.mac.clone();
        }
        if record.ip.is_some() {
            self.ip = record.ip;
            self.prefix_len = record.prefix_len;
        }
        if record.speed_bps.is_some() {
            self.speed_bps = record.speed_bps;
        }
        if record.mtu.is_some() {
            self.mtu = record.mtu;
        }
        self.last_seen = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(InterfaceStatus::from_code(1), InterfaceStatus::Up);
        assert_eq!(InterfaceStatus::from_code(2), InterfaceStatus::Down);
        assert_eq!(InterfaceStatus::from_code(7), InterfaceStatus::LowerLayerDown);
        assert_eq!(InterfaceStatus::from_code(4), InterfaceStatus::Unknown);
        assert_eq!(InterfaceStatus::from_code(99), InterfaceStatus::Unknown);
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(InterfaceType::from_code(6), InterfaceType::Ethernet);
        assert_eq!(InterfaceType::from_code(24), InterfaceType::Loopback);
        assert_eq!(InterfaceType::from_code(161), InterfaceType::Aggregate);
        assert_eq!(InterfaceType::from_code(-3), InterfaceType::Unknown);
        assert!(InterfaceType::Aggregate.is_logical());
        assert!(!InterfaceType::Ethernet.is_logical());
    }

    #[test]
    fn test_apply_record_adopts_placeholder() {
        let device = DeviceId::new();
        let mut interface = Interface::placeholder(device, "Gi0/1");
        assert_eq!(interface.index, None);

        let record = InterfaceRecord {
            index: 10101,
            name: "Gi0/1".to_string(),
            if_type: InterfaceType::Ethernet,
            oper_status: InterfaceStatus::Up,
            speed_bps: Some(1_000_000_000),
            ..Default::default()
        };
        interface.apply_record(&record);

        assert_eq!(interface.index, Some(10101));
        assert_eq!(interface.if_type, InterfaceType::Ethernet);
        assert_eq!(interface.speed_bps, Some(1_000_000_000));
        assert_eq!(interface.mtu, None);
    }
}
