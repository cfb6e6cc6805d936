//! CDP neighbor strategy over the CISCO-CDP-MIB cache table

use netloom_core::{InterfaceRecord, Neighbor, NeighborProtocol};
use netloom_snmp::{Credentials, ProtocolPort, ProtocolResult, SnmpValue};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::mib;

pub struct CdpStrategy {
    port: Arc<dyn ProtocolPort>,
}

impl CdpStrategy {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self { port }
    }

    /// Read the CDP cache of one device
    ///
    /// The cache is indexed by (ifIndex, device index), so the local
    /// interface resolves directly against the interface table.
    pub async fn neighbors(
        &self,
        address: IpAddr,
        credentials: &Credentials,
        local_interfaces: &[InterfaceRecord],
    ) -> ProtocolResult<Vec<Neighbor>> {
        let entry = mib::oid(mib::CDP_CACHE_ENTRY);
        let rows = self.port.walk(address, &entry, credentials).await?;

        let mut cache: BTreeMap<(u32, u32), BTreeMap<u32, SnmpValue>> = BTreeMap::new();
        for (oid, value) in rows {
            if let Some((column, [if_index, dev_index])) = mib::split_entry(&oid, &entry) {
                cache
                    .entry((*if_index, *dev_index))
                    .or_default()
                    .insert(column, value);
            }
        }

        let neighbors: Vec<Neighbor> = cache
            .into_iter()
            .map(|((if_index, _), columns)| build_neighbor(if_index, &columns, local_interfaces))
            .collect();

        debug!(address = %address, neighbors = neighbors.len(), "Read CDP neighbors");
        Ok(neighbors)
    }
}

fn build_neighbor(
    if_index: u32,
    columns: &BTreeMap<u32, SnmpValue>,
    local_interfaces: &[InterfaceRecord],
) -> Neighbor {
    let text = |column: u32| {
        columns
            .get(&column)
            .and_then(|v| v.as_text())
            .filter(|s| !s.is_empty())
    };

    let mut neighbor = Neighbor::new(NeighborProtocol::Cdp);
    neighbor.local_if_index = Some(if_index);
    neighbor.local_interface = local_interfaces
        .iter()
        .find(|i| i.index == if_index)
        .map(|i| i.name.clone());
    neighbor.remote_name = text(mib::CDP_CACHE_DEVICE_ID).map(|id| strip_serial(&id));
    neighbor.remote_port = text(mib::CDP_CACHE_DEVICE_PORT);
    neighbor.remote_platform = text(mib::CDP_CACHE_PLATFORM);

    let address_type = columns
        .get(&mib::CDP_CACHE_ADDRESS_TYPE)
        .and_then(|v| v.as_i64());
    // Agents that omit the type column still report IPv4 here
    if address_type.is_none() || address_type == Some(i64::from(mib::ADDRESS_FAMILY_IPV4)) {
        neighbor.remote_address = columns
            .get(&mib::CDP_CACHE_ADDRESS)
            .and_then(|v| v.as_ipv4())
            .map(IpAddr::V4);
    }

    if neighbor.remote_platform.is_none() {
        neighbor.remote_platform = text(mib::CDP_CACHE_VERSION)
            .and_then(|v| v.lines().next().map(str::to_string));
    }
    neighbor
}

/// NX-OS appends the chassis serial in parentheses (`sw2(FOX1234)`)
fn strip_serial(device_id: &str) -> String {
    match device_id.find('(') {
        Some(pos) if device_id.ends_with(')') && pos > 0 => device_id[..pos].to_string(),
        _ => device_id.to_string(),
    }
}
