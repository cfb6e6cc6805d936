//! LLDP neighbor strategy over LLDP-MIB remote tables
//!
//! Neighbors are read from `lldpRemTable`, keyed by (local port, remote
//! index), with management addresses joined in from `lldpRemManAddrTable`.
//! The local port number is resolved to an interface name through the
//! interface records of the same discovery run.

use netloom_core::{InterfaceRecord, Neighbor, NeighborProtocol};
use netloom_snmp::{Credentials, ProtocolPort, ProtocolResult, SnmpValue};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::interfaces::ipv4_from_index;
use crate::mib;

/// lldpRemChassisIdSubtype / lldpRemPortIdSubtype value for a MAC address
const SUBTYPE_MAC_ADDRESS: i64 = 3;
const CHASSIS_SUBTYPE_MAC_ADDRESS: i64 = 4;

/// Rows of lldpRemTable grouped by (local port, remote index)
type RemoteRows = BTreeMap<(u32, u32), BTreeMap<u32, SnmpValue>>;

pub struct LldpStrategy {
    port: Arc<dyn ProtocolPort>,
}

impl LldpStrategy {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self { port }
    }

    /// Read the LLDP neighbor table of one device
    pub async fn neighbors(
        &self,
        address: IpAddr,
        credentials: &Credentials,
        local_interfaces: &[InterfaceRecord],
    ) -> ProtocolResult<Vec<Neighbor>> {
        let entry = mib::oid(mib::LLDP_REM_ENTRY);
        let rows = self.port.walk(address, &entry, credentials).await?;

        let mut remotes: RemoteRows = BTreeMap::new();
        for (oid, value) in rows {
            // Index is timeMark.localPortNum.remIndex; the time mark is ignored
            if let Some((column, [_, local_port, rem_index])) = mib::split_entry(&oid, &entry) {
                remotes
                    .entry((*local_port, *rem_index))
                    .or_default()
                    .insert(column, value);
            }
        }

        let addresses = if remotes.is_empty() {
            BTreeMap::new()
        } else {
            self.management_addresses(address, credentials).await
        };

        let neighbors: Vec<Neighbor> = remotes
            .into_iter()
            .map(|(key, columns)| {
                build_neighbor(key, &columns, addresses.get(&key).copied(), local_interfaces)
            })
            .collect();

        debug!(address = %address, neighbors = neighbors.len(), "Read LLDP neighbors");
        Ok(neighbors)
    }

    /// First IPv4 management address per remote, keyed like the remote table
    ///
    /// The address table is optional; a failing walk only leaves neighbors
    /// without an address.
    async fn management_addresses(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> BTreeMap<(u32, u32), IpAddr> {
        let entry = mib::oid(mib::LLDP_REM_MAN_ADDR_ENTRY);
        let rows = match self.port.walk(address, &entry, credentials).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!(address = %address, error = %e, "LLDP management address walk failed");
                return BTreeMap::new();
            }
        };

        let mut addresses = BTreeMap::new();
        for oid in rows.keys() {
            let Some((_, index)) = mib::split_entry(oid, &entry) else {
                continue;
            };
            // timeMark.localPort.remIndex.subtype.length.address...
            if let [_, local_port, rem_index, subtype, 4, addr @ ..] = index {
                if *subtype != mib::ADDRESS_FAMILY_IPV4 {
                    continue;
                }
                if let Some(ip) = ipv4_from_index(addr) {
                    trace!(local_port, rem_index, ip = %ip, "LLDP management address");
                    addresses
                        .entry((*local_port, *rem_index))
                        .or_insert(IpAddr::V4(ip));
                }
            }
        }
        addresses
    }
}

fn build_neighbor(
    (local_port, _): (u32, u32),
    columns: &BTreeMap<u32, SnmpValue>,
    address: Option<IpAddr>,
    local_interfaces: &[InterfaceRecord],
) -> Neighbor {
    let text = |column: u32| {
        columns
            .get(&column)
            .and_then(|v| v.as_text())
            .filter(|s| !s.is_empty())
    };
    let subtype = |column: u32| columns.get(&column).and_then(|v| v.as_i64());

    let mut neighbor = Neighbor::new(NeighborProtocol::Lldp);
    neighbor.local_if_index = Some(local_port);
    neighbor.local_interface = local_interfaces
        .iter()
        .find(|i| i.index == local_port)
        .map(|i| i.name.clone());

    neighbor.remote_chassis_id = columns.get(&mib::LLDP_REM_CHASSIS_ID).and_then(|v| {
        if subtype(mib::LLDP_REM_CHASSIS_ID_SUBTYPE) == Some(CHASSIS_SUBTYPE_MAC_ADDRESS)
            || !v.is_printable()
        {
            v.as_mac()
        } else {
            v.as_text()
        }
    });
    neighbor.remote_port = columns.get(&mib::LLDP_REM_PORT_ID).and_then(|v| {
        if subtype(mib::LLDP_REM_PORT_ID_SUBTYPE) == Some(SUBTYPE_MAC_ADDRESS) || !v.is_printable()
        {
            v.as_mac()
        } else {
            v.as_text()
        }
    });
    neighbor.remote_port_description = text(mib::LLDP_REM_PORT_DESC);
    neighbor.remote_name = text(mib::LLDP_REM_SYS_NAME);
    neighbor.remote_platform = text(mib::LLDP_REM_SYS_DESC)
        .and_then(|d| d.lines().next().map(str::to_string));
    neighbor.remote_address = address;
    neighbor
}
