//! Per-address discovery output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::device::DeviceIdentity;
use crate::interface::InterfaceRecord;
use crate::neighbor::Neighbor;

/// Discovery steps run against one address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStep {
    Identity,
    Interfaces,
    Lldp,
    Cdp,
}

impl std::fmt::Display for DiscoveryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiscoveryStep::Identity => "identity",
            DiscoveryStep::Interfaces => "interfaces",
            DiscoveryStep::Lldp => "lldp",
            DiscoveryStep::Cdp => "cdp",
        };
        f.write_str(name)
    }
}

/// An optional step that failed without aborting discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: DiscoveryStep,
    pub message: String,
}

/// Everything learned about one address in one discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub address: IpAddr,
    pub identity: DeviceIdentity,
    pub interfaces: Vec<InterfaceRecord>,
    pub neighbors: Vec<Neighbor>,
    pub failures: Vec<StepFailure>,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveryResult {
    pub fn new(address: IpAddr, identity: DeviceIdentity) -> Self {
        Self {
            address,
            identity,
            interfaces: Vec::new(),
            neighbors: Vec::new(),
            failures: Vec::new(),
            discovered_at: Utc::now(),
        }
    }

    /// Record a failed optional step
    pub fn record_failure(&mut self, step: DiscoveryStep, message: impl Into<String>) {
        self.failures.push(StepFailure {
            step,
            message: message.into(),
        });
    }

    /// True if any optional step failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Neighbor addresses the walker may follow from here
    pub fn neighbor_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.neighbors
            .iter()
            .filter_map(|n| n.remote_address)
            .filter(move |addr| *addr != self.address)
    }

    /// Addresses configured on this device's own interfaces
    pub fn interface_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.interfaces.iter().filter_map(|i| i.ip)
    }
}
