//! Discovery strategies and the factory that builds them

use netloom_core::{DiscoveryResult, DiscoveryStep, InterfaceRecord, Neighbor};
use netloom_snmp::{Credentials, ProtocolPort, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

use crate::cdp::CdpStrategy;
use crate::composite::CompositeStrategy;
use crate::error::DiscoveryError;
use crate::identity::DeviceProbe;
use crate::interfaces::InterfaceTableReader;
use crate::lldp::LldpStrategy;

/// Which strategy to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Identity and interfaces only
    Snmp,
    Lldp,
    Cdp,
    #[default]
    Composite,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::Snmp => "snmp",
            StrategyKind::Lldp => "lldp",
            StrategyKind::Cdp => "cdp",
            StrategyKind::Composite => "composite",
        };
        f.write_str(name)
    }
}

/// Identity probe followed by an interface-table read
pub struct SnmpStrategy {
    probe: DeviceProbe,
    interfaces: InterfaceTableReader,
}

impl SnmpStrategy {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self {
            probe: DeviceProbe::new(port.clone()),
            interfaces: InterfaceTableReader::new(port),
        }
    }

    pub async fn discover(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        let identity = self
            .probe
            .probe(address, credentials)
            .await
            .map_err(|source| DiscoveryError::Identity { address, source })?;

        let mut result = DiscoveryResult::new(address, identity);
        match self.interfaces.read(address, credentials).await {
            Ok(records) => result.interfaces = records,
            Err(e) => {
                warn!(address = %address, error = %e, "Interface table read failed");
                result.record_failure(DiscoveryStep::Interfaces, e.to_string());
            }
        }
        Ok(result)
    }
}

/// A constructed discovery strategy bound to one protocol port
///
/// Every variant runs the identity probe and interface read; they differ in
/// which neighbor tables are consulted.
pub enum DiscoveryStrategy {
    Snmp(SnmpStrategy),
    Lldp(SnmpStrategy, LldpStrategy),
    Cdp(SnmpStrategy, CdpStrategy),
    Composite(CompositeStrategy),
}

impl DiscoveryStrategy {
    /// Build the strategy for `kind` over `port`
    pub fn for_kind(kind: StrategyKind, port: Arc<dyn ProtocolPort>) -> Self {
        match kind {
            StrategyKind::Snmp => DiscoveryStrategy::Snmp(SnmpStrategy::new(port)),
            StrategyKind::Lldp => {
                DiscoveryStrategy::Lldp(SnmpStrategy::new(port.clone()), LldpStrategy::new(port))
            }
            StrategyKind::Cdp => {
                DiscoveryStrategy::Cdp(SnmpStrategy::new(port.clone()), CdpStrategy::new(port))
            }
            StrategyKind::Composite => DiscoveryStrategy::Composite(CompositeStrategy::new(port)),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            DiscoveryStrategy::Snmp(_) => StrategyKind::Snmp,
            DiscoveryStrategy::Lldp(..) => StrategyKind::Lldp,
            DiscoveryStrategy::Cdp(..) => StrategyKind::Cdp,
            DiscoveryStrategy::Composite(_) => StrategyKind::Composite,
        }
    }

    /// Discover one address
    pub async fn discover(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        match self {
            DiscoveryStrategy::Snmp(base) => base.discover(address, credentials).await,
            DiscoveryStrategy::Lldp(base, lldp) => {
                let mut result = base.discover(address, credentials).await?;
                match lldp.neighbors(address, credentials, &result.interfaces).await {
                    Ok(neighbors) => result.neighbors = neighbors,
                    Err(e) => {
                        warn!(address = %address, error = %e, "LLDP neighbor read failed");
                        result.record_failure(DiscoveryStep::Lldp, e.to_string());
                    }
                }
                Ok(result)
            }
            DiscoveryStrategy::Cdp(base, cdp) => {
                let mut result = base.discover(address, credentials).await?;
                match cdp.neighbors(address, credentials, &result.interfaces).await {
                    Ok(neighbors) => result.neighbors = neighbors,
                    Err(e) => {
                        warn!(address = %address, error = %e, "CDP neighbor read failed");
                        result.record_failure(DiscoveryStep::Cdp, e.to_string());
                    }
                }
                Ok(result)
            }
            DiscoveryStrategy::Composite(composite) => composite.discover(address, credentials).await,
        }
    }

    /// Neighbor tables only, resolved against caller-supplied interfaces
    pub async fn neighbors(
        &self,
        address: IpAddr,
        credentials: &Credentials,
        local_interfaces: &[InterfaceRecord],
    ) -> ProtocolResult<Vec<Neighbor>> {
        match self {
            DiscoveryStrategy::Snmp(_) => Ok(Vec::new()),
            DiscoveryStrategy::Lldp(_, lldp) => {
                lldp.neighbors(address, credentials, local_interfaces).await
            }
            DiscoveryStrategy::Cdp(_, cdp) => cdp.neighbors(address, credentials, local_interfaces).await,
            DiscoveryStrategy::Composite(composite) => {
                composite
                    .neighbors(address, credentials, local_interfaces)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ip, MockDevice, MockPort};
    use netloom_core::NeighborProtocol;

    fn port() -> Arc<dyn ProtocolPort> {
        let device = MockDevice::new([10, 0, 0, 1], "sw1", "switch")
            .interface(1, "Gi0/1")
            .lldp_neighbor(1, 1, "sw2", "Gi0/2", Some([10, 0, 0, 2]))
            .cdp_neighbor(1, 4, "sw3", "Gi0/3", Some([10, 0, 0, 3]));
        Arc::new(MockPort::new().with_device(device))
    }

    #[test]
    fn test_factory_builds_requested_kind() {
        for kind in [
            StrategyKind::Snmp,
            StrategyKind::Lldp,
            StrategyKind::Cdp,
            StrategyKind::Composite,
        ] {
            assert_eq!(DiscoveryStrategy::for_kind(kind, port()).kind(), kind);
        }
    }

    #[test]
    fn test_kind_from_config_text() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: StrategyKind,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"strategy":"lldp"}"#).unwrap();
        assert_eq!(parsed.strategy, StrategyKind::Lldp);
        assert_eq!(StrategyKind::default(), StrategyKind::Composite);
    }

    #[tokio::test]
    async fn test_each_kind_reads_its_tables() {
        let creds = Credentials::v2c("public");
        let addr = ip([10, 0, 0, 1]);

        let snmp = DiscoveryStrategy::for_kind(StrategyKind::Snmp, port());
        let result = snmp.discover(addr, &creds).await.unwrap();
        assert_eq!(result.interfaces.len(), 1);
        assert!(result.neighbors.is_empty());

        let lldp = DiscoveryStrategy::for_kind(StrategyKind::Lldp, port());
        let result = lldp.discover(addr, &creds).await.unwrap();
        assert_eq!(result.neighbors.len(), 1);
        assert_eq!(result.neighbors[0].protocol, NeighborProtocol::Lldp);

        let cdp = DiscoveryStrategy::for_kind(StrategyKind::Cdp, port());
        let result = cdp.discover(addr, &creds).await.unwrap();
        assert_eq!(result.neighbors.len(), 1);
        assert_eq!(result.neighbors[0].remote_name.as_deref(), Some("sw3"));

        let composite = DiscoveryStrategy::for_kind(StrategyKind::Composite, port());
        let neighbors = composite
            .neighbors(addr, &creds, &result.interfaces)
            .await
            .unwrap();
        assert_eq!(neighbors.len(), 2);
    }
}
