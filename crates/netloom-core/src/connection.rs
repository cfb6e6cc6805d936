//! Adjacency edges between interfaces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceId;
use crate::interface::InterfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which neighbor protocol reported an adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborProtocol {
    Lldp,
    Cdp,
    Both,
    Inferred,
}

impl NeighborProtocol {
    /// Combine two reports of the same adjacency
    ///
    /// Never loses information: `Both` absorbs everything, `Inferred` yields
    /// to any protocol-reported value, and LLDP + CDP becomes `Both`.
    pub fn combine(self, other: NeighborProtocol) -> NeighborProtocol {
        use NeighborProtocol::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Both, _) | (_, Both) => Both,
            (Inferred, b) => b,
            (a, Inferred) => a,
            (Lldp, Cdp) | (Cdp, Lldp) => Both,
            // Remaining pairs are equal and handled above
            (a, _) => a,
        }
    }
}

impl std::fmt::Display for NeighborProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NeighborProtocol::Lldp => "lldp",
            NeighborProtocol::Cdp => "cdp",
            NeighborProtocol::Both => "both",
            NeighborProtocol::Inferred => "inferred",
        };
        f.write_str(name)
    }
}

/// Physical cable or logical (aggregate, tunnel, VLAN) link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Physical,
    Logical,
}

/// One side of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub device: DeviceId,
    pub interface: InterfaceId,
}

/// An undirected adjacency stored as two interface endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub local: Endpoint,
    pub remote: Endpoint,
    pub protocol: NeighborProtocol,
    pub kind: ConnectionKind,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        local: Endpoint,
        remote: Endpoint,
        protocol: NeighborProtocol,
        kind: ConnectionKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            local,
            remote,
            protocol,
            kind,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Endpoints in canonical order, identical for both directions
    pub fn endpoint_key(&self) -> (Endpoint, Endpoint) {
        endpoint_key(&self.local, &self.remote)
    }

    /// True if this connection joins `a` and `b`, in either direction
    pub fn joins(&self, a: &Endpoint, b: &Endpoint) -> bool {
        self.endpoint_key() == endpoint_key(a, b)
    }

    /// Both ends on the same device
    pub fn is_self_loop(&self) -> bool {
        self.local.device == self.remote.device
    }

    /// Raise the protocol tag with another report; returns true if it changed
    pub fn upgrade_protocol(&mut self, reported: NeighborProtocol) -> bool {
        let combined = self.protocol.combine(reported);
        let changed = combined != self.protocol;
        self.protocol = combined;
        changed
    }
}

/// Canonical ordering of an unordered endpoint pair
pub fn endpoint_key(a: &Endpoint, b: &Endpoint) -> (Endpoint, Endpoint) {
    if a <= b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NeighborProtocol::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            device: DeviceId::new(),
            interface: InterfaceId::new(),
        }
    }

    #[test]
    fn test_protocol_combine() {
        assert_eq!(Lldp.combine(Cdp), Both);
        assert_eq!(Cdp.combine(Lldp), Both);
        assert_eq!(Lldp.combine(Lldp), Lldp);
        assert_eq!(Inferred.combine(Cdp), Cdp);
        assert_eq!(Lldp.combine(Inferred), Lldp);
        assert_eq!(Both.combine(Lldp), Both);
        assert_eq!(Inferred.combine(Both), Both);
    }

    #[test]
    fn test_upgrade_never_downgrades() {
        let mut conn = Connection::new(endpoint(), endpoint(), Lldp, ConnectionKind::Physical);
        assert!(conn.upgrade_protocol(Cdp));
        assert_eq!(conn.protocol, Both);
        assert!(!conn.upgrade_protocol(Lldp));
        assert!(!conn.upgrade_protocol(Inferred));
        assert_eq!(conn.protocol, Both);
    }

    #[test]
    fn test_joins_is_unordered() {
        let a = endpoint();
        let b = endpoint();
        let conn = Connection::new(a, b, Cdp, ConnectionKind::Physical);
        assert!(conn.joins(&a, &b));
        assert!(conn.joins(&b, &a));
        assert!(!conn.joins(&a, &endpoint()));
        assert!(!conn.is_self_loop());
    }
}
