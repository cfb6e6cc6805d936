//! Composite discovery: identity, interfaces, then LLDP and CDP together

use netloom_core::{DiscoveryResult, DiscoveryStep, InterfaceRecord, Neighbor};
use netloom_snmp::{Credentials, ProtocolPort, ProtocolResult};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cdp::CdpStrategy;
use crate::error::DiscoveryError;
use crate::lldp::LldpStrategy;
use crate::strategy::SnmpStrategy;

pub struct CompositeStrategy {
    base: SnmpStrategy,
    lldp: LldpStrategy,
    cdp: CdpStrategy,
}

impl CompositeStrategy {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self {
            base: SnmpStrategy::new(port.clone()),
            lldp: LldpStrategy::new(port.clone()),
            cdp: CdpStrategy::new(port),
        }
    }

    /// Full discovery of one address
    ///
    /// Only the identity probe is mandatory. A neighbor protocol the device
    /// does not run is logged and recorded on the result as a failed step.
    pub async fn discover(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        let mut result = self.base.discover(address, credentials).await?;

        let (lldp, cdp) = tokio::join!(
            self.lldp.neighbors(address, credentials, &result.interfaces),
            self.cdp.neighbors(address, credentials, &result.interfaces),
        );

        let lldp = lldp.unwrap_or_else(|e| {
            warn!(address = %address, error = %e, "LLDP neighbor read failed");
            result.record_failure(DiscoveryStep::Lldp, e.to_string());
            Vec::new()
        });
        let cdp = cdp.unwrap_or_else(|e| {
            warn!(address = %address, error = %e, "CDP neighbor read failed");
            result.record_failure(DiscoveryStep::Cdp, e.to_string());
            Vec::new()
        });

        result.neighbors = merge_neighbors(lldp, cdp);
        debug!(
            address = %address,
            interfaces = result.interfaces.len(),
            neighbors = result.neighbors.len(),
            partial = result.is_partial(),
            "Composite discovery finished"
        );
        Ok(result)
    }

    /// Both neighbor tables, merged; fails only when both reads fail
    pub async fn neighbors(
        &self,
        address: IpAddr,
        credentials: &Credentials,
        local_interfaces: &[InterfaceRecord],
    ) -> ProtocolResult<Vec<Neighbor>> {
        let (lldp, cdp) = tokio::join!(
            self.lldp.neighbors(address, credentials, local_interfaces),
            self.cdp.neighbors(address, credentials, local_interfaces),
        );
        match (lldp, cdp) {
            (Err(e), Err(_)) => Err(e),
            (lldp, cdp) => Ok(merge_neighbors(
                lldp.unwrap_or_default(),
                cdp.unwrap_or_default(),
            )),
        }
    }
}

/// Union of LLDP and CDP reports with duplicates folded together
///
/// Two entries describe the same adjacency when their remote ports agree and
/// their remote addresses (or, lacking those, system names) agree. The
/// surviving entry is tagged `Both` and keeps the richest set of fields.
pub fn merge_neighbors(lldp: Vec<Neighbor>, cdp: Vec<Neighbor>) -> Vec<Neighbor> {
    let mut merged: Vec<Neighbor> = Vec::with_capacity(lldp.len() + cdp.len());
    for neighbor in lldp.into_iter().chain(cdp) {
        match merged.iter_mut().find(|n| n.same_adjacency(&neighbor)) {
            Some(existing) => existing.absorb(neighbor),
            None => merged.push(neighbor),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mib;
    use crate::mock::{ip, MockDevice, MockPort};
    use netloom_core::NeighborProtocol;
    use netloom_snmp::ProtocolError;

    fn neighbor(protocol: NeighborProtocol, address: [u8; 4], port: &str) -> Neighbor {
        let mut n = Neighbor::new(protocol);
        n.remote_address = Some(ip(address));
        n.remote_port = Some(port.to_string());
        n.remote_name = Some("sw2".to_string());
        n
    }

    #[test]
    fn test_identical_reports_become_one_both_entry() {
        let merged = merge_neighbors(
            vec![neighbor(NeighborProtocol::Lldp, [10, 0, 0, 2], "Gi0/1")],
            vec![neighbor(NeighborProtocol::Cdp, [10, 0, 0, 2], "Gi0/1")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].protocol, NeighborProtocol::Both);
    }

    #[test]
    fn test_distinct_ports_stay_separate() {
        let merged = merge_neighbors(
            vec![
                neighbor(NeighborProtocol::Lldp, [10, 0, 0, 2], "Gi0/1"),
                neighbor(NeighborProtocol::Lldp, [10, 0, 0, 2], "Gi0/2"),
            ],
            vec![neighbor(NeighborProtocol::Cdp, [10, 0, 0, 3], "Gi0/1")],
        );
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|n| n.protocol != NeighborProtocol::Both));
    }

    #[tokio::test]
    async fn test_composite_dedups_across_protocols() {
        let device = MockDevice::new([10, 0, 0, 1], "sw1", "switch")
            .interface(1, "Gi0/1")
            .lldp_neighbor(1, 1, "sw2", "Gi0/24", Some([10, 0, 0, 2]))
            .cdp_neighbor(1, 1, "sw2", "GigabitEthernet0/24", Some([10, 0, 0, 2]));
        let strategy = CompositeStrategy::new(Arc::new(MockPort::new().with_device(device)));

        let result = strategy
            .discover(ip([10, 0, 0, 1]), &Credentials::v2c("public"))
            .await
            .unwrap();

        assert_eq!(result.neighbors.len(), 1);
        let n = &result.neighbors[0];
        assert_eq!(n.protocol, NeighborProtocol::Both);
        assert_eq!(n.local_interface.as_deref(), Some("Gi0/1"));
        assert!(n.remote_chassis_id.is_some());
        assert!(n.remote_platform.is_some());
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_missing_neighbor_protocol_is_not_fatal() {
        let addr = ip([10, 0, 0, 1]);
        let device = MockDevice::new([10, 0, 0, 1], "r1", "router")
            .interface(1, "Gi0/1")
            .lldp_neighbor(1, 1, "r2", "Gi0/0", Some([10, 0, 0, 2]));
        let port = MockPort::new()
            .with_device(device)
            .fail_prefix(addr, mib::CDP_CACHE_ENTRY, ProtocolError::Other("noSuchObject".into()));
        let strategy = CompositeStrategy::new(Arc::new(port));

        let result = strategy.discover(addr, &Credentials::v2c("public")).await.unwrap();
        assert_eq!(result.neighbors.len(), 1);
        assert_eq!(result.neighbors[0].protocol, NeighborProtocol::Lldp);
        assert!(result.is_partial());
        assert_eq!(result.failures[0].step, DiscoveryStep::Cdp);
    }

    #[tokio::test]
    async fn test_identity_failure_aborts() {
        let strategy = CompositeStrategy::new(Arc::new(MockPort::new()));
        let err = strategy
            .discover(ip([10, 0, 0, 9]), &Credentials::v2c("public"))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Identity { .. }));
        assert_eq!(err.protocol_error(), Some(&ProtocolError::Timeout));
    }
}
