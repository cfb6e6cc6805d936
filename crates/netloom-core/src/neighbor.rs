//! Neighbor adjacencies reported by link-layer discovery protocols

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::connection::NeighborProtocol;

/// One adjacency as seen from the local device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub protocol: NeighborProtocol,
    /// Local ifIndex the neighbor was heard on
    pub local_if_index: Option<u32>,
    /// Local interface name, resolved from the interface table of the same run
    pub local_interface: Option<String>,
    pub remote_name: Option<String>,
    pub remote_chassis_id: Option<String>,
    pub remote_port: Option<String>,
    pub remote_port_description: Option<String>,
    /// Remote management address; required before the walker may follow it
    pub remote_address: Option<IpAddr>,
    pub remote_platform: Option<String>,
}

impl Neighbor {
    pub fn new(protocol: NeighborProtocol) -> Self {
        Self {
            protocol,
            local_if_index: None,
            local_interface: None,
            remote_name: None,
            remote_chassis_id: None,
            remote_port: None,
            remote_port_description: None,
            remote_address: None,
            remote_platform: None,
        }
    }

    /// True if this adjacency can be followed during a topology walk
    pub fn is_expandable(&self) -> bool {
        self.remote_address.is_some()
    }

    /// True if `other` describes the same remote end
    ///
    /// Remote ports must agree after name normalisation. Remote addresses
    /// decide when both sides carry one; otherwise the remote system names
    /// must agree.
    pub fn same_adjacency(&self, other: &Neighbor) -> bool {
        let ports_match = match (&self.remote_port, &other.remote_port) {
            (Some(a), Some(b)) => normalize_port_name(a) == normalize_port_name(b),
            (None, None) => true,
            _ => false,
        };
        if !ports_match {
            return false;
        }

        match (self.remote_address, other.remote_address) {
            (Some(a), Some(b)) => a == b,
            _ => match (&self.remote_name, &other.remote_name) {
                (Some(a), Some(b)) => system_name(a) == system_name(b),
                _ => false,
            },
        }
    }

    /// Merge another report of the same adjacency into this one
    pub fn absorb(&mut self, other: Neighbor) {
        self.protocol = self.protocol.combine(other.protocol);
        fill(&mut self.local_if_index, other.local_if_index);
        fill(&mut self.local_interface, other.local_interface);
        fill(&mut self.remote_name, other.remote_name);
        fill(&mut self.remote_chassis_id, other.remote_chassis_id);
        fill(&mut self.remote_port, other.remote_port);
        fill(&mut self.remote_port_description, other.remote_port_description);
        fill(&mut self.remote_address, other.remote_address);
        fill(&mut self.remote_platform, other.remote_platform);
    }
}

fn fill<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

/// Hostname part of a system name, lowercased (`sw1.example.net` → `sw1`)
pub fn system_name(name: &str) -> String {
    name.trim()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Abbreviated and full port-name prefixes, longest abbreviation first
const PORT_PREFIXES: &[(&str, &str)] = &[
    ("hundredgige", "hundredgigabitethernet"),
    ("fortygige", "fortygigabitethernet"),
    ("tengige", "tengigabitethernet"),
    ("port-channel", "port-channel"),
    ("gige", "gigabitethernet"),
    ("eth", "ethernet"),
    ("hu", "hundredgigabitethernet"),
    ("fo", "fortygigabitethernet"),
    ("te", "tengigabitethernet"),
    ("gi", "gigabitethernet"),
    ("fa", "fastethernet"),
    ("et", "ethernet"),
    ("po", "port-channel"),
];

/// Canonical form of an interface name for cross-protocol comparison
///
/// Lowercases, strips whitespace and expands common vendor abbreviations,
/// so `Gi0/1`, `gi 0/1` and `GigabitEthernet0/1` compare equal.
pub fn normalize_port_name(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    let split = compact
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(compact.len());
    let (prefix, rest) = compact.split_at(split);

    for (short, full) in PORT_PREFIXES {
        if prefix == *short || prefix == *full {
            return format!("{}{}", full, rest);
        }
    }
    compact
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn neighbor(
        protocol: NeighborProtocol,
        address: Option<[u8; 4]>,
        name: &str,
        port: &str,
    ) -> Neighbor {
        let mut n = Neighbor::new(protocol);
        n.remote_address = address.map(|a| IpAddr::V4(Ipv4Addr::from(a)));
        n.remote_name = Some(name.to_string());
        n.remote_port = Some(port.to_string());
        n
    }

    #[test]
    fn test_normalize_port_name() {
        assert_eq!(normalize_port_name("Gi0/1"), "gigabitethernet0/1");
        assert_eq!(normalize_port_name("GigabitEthernet0/1"), "gigabitethernet0/1");
        assert_eq!(normalize_port_name("gi 0/1"), "gigabitethernet0/1");
        assert_eq!(normalize_port_name("Te1/0/48"), "tengigabitethernet1/0/48");
        assert_eq!(normalize_port_name("Eth1/7"), "ethernet1/7");
        assert_eq!(normalize_port_name("Po12"), "port-channel12");
        assert_eq!(normalize_port_name("swp12"), "swp12");
        assert_eq!(normalize_port_name("ge-0/0/1"), "ge-0/0/1");
    }

    #[test]
    fn test_same_adjacency_by_address() {
        let a = neighbor(NeighborProtocol::Lldp, Some([10, 0, 0, 2]), "sw2", "Gi0/1");
        let b = neighbor(NeighborProtocol::Cdp, Some([10, 0, 0, 2]), "sw2.lab", "GigabitEthernet0/1");
        let c = neighbor(NeighborProtocol::Cdp, Some([10, 0, 0, 3]), "sw2", "Gi0/1");
        assert!(a.same_adjacency(&b));
        assert!(!a.same_adjacency(&c));
    }

    #[test]
    fn test_same_adjacency_by_name_when_address_missing() {
        let a = neighbor(NeighborProtocol::Lldp, None, "SW2.example.net", "Gi0/1");
        let b = neighbor(NeighborProtocol::Cdp, Some([10, 0, 0, 2]), "sw2", "Gi0/1");
        let c = neighbor(NeighborProtocol::Cdp, Some([10, 0, 0, 2]), "sw2", "Gi0/2");
        assert!(a.same_adjacency(&b));
        assert!(!a.same_adjacency(&c));
    }

    #[test]
    fn test_absorb_fills_gaps_and_combines_protocol() {
        let mut a = neighbor(NeighborProtocol::Lldp, None, "sw2", "Gi0/1");
        a.remote_chassis_id = Some("00:11:22:33:44:55".to_string());
        let mut b = neighbor(NeighborProtocol::Cdp, Some([10, 0, 0, 2]), "sw2-other", "Gi0/1");
        b.remote_platform = Some("cisco WS-C2960".to_string());

        a.absorb(b);
        assert_eq!(a.protocol, NeighborProtocol::Both);
        assert_eq!(a.remote_name.as_deref(), Some("sw2"));
        assert_eq!(a.remote_address, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
        assert_eq!(a.remote_platform.as_deref(), Some("cisco WS-C2960"));
        assert_eq!(a.remote_chassis_id.as_deref(), Some("00:11:22:33:44:55"));
        assert!(a.is_expandable());
    }
}
