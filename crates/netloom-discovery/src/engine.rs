//! Discovery engine: the operation surface handed to callers
//!
//! Wires one protocol port, one inventory and one strategy together and
//! exposes single-device discovery, subnet scans, topology walks and the
//! graph queries over the resulting inventory.

use netloom_core::{
    Connection, Device, DeviceId, LinkPath, Path, PersistenceError, PersistencePort,
    TopologyGraph,
};
use netloom_snmp::{Credentials, ProtocolPort};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::cancel::CancelSignal;
use crate::error::{DiscoveryError, ValidationError};
use crate::reachability::{AssumeReachable, PingReachability, PrecheckKind, Reachability};
use crate::reconcile::{MergeOutcome, ReconciliationMerger};
use crate::scanner::SubnetScanner;
use crate::strategy::{DiscoveryStrategy, StrategyKind};
use crate::walker::TopologyWalker;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("no device matches {0}")]
    UnknownDevice(String),
}

/// Engine settings, the `[discovery]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: StrategyKind,
    /// Addresses discovered in parallel
    pub concurrency: usize,
    /// Walk bound on discovered addresses
    pub max_devices: usize,
    /// Walk bound on hops from the nearest seed
    pub max_depth: usize,
    /// Largest subnet a scan accepts
    pub max_hosts: usize,
    pub precheck: PrecheckKind,
    pub ping_timeout_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Composite,
            concurrency: 32,
            max_devices: 512,
            max_depth: 8,
            max_hosts: 65534,
            precheck: PrecheckKind::Ping,
            ping_timeout_secs: 1,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.max_devices == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_devices must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Successes and per-address failures of a subnet scan
#[derive(Debug, Default)]
pub struct BatchReport {
    pub devices: Vec<Device>,
    pub failures: Vec<(IpAddr, DiscoveryError)>,
    /// Hosts that failed the liveness pre-check; each also has a timeout in `failures`
    pub skipped: Vec<IpAddr>,
    pub cancelled: bool,
}

/// Devices and connections reached by one topology walk
#[derive(Debug, Default)]
pub struct TopologyReport {
    pub devices: Vec<Device>,
    pub connections: Vec<Connection>,
    pub failures: Vec<(IpAddr, DiscoveryError)>,
    pub truncated: bool,
    pub cancelled: bool,
}

impl TopologyReport {
    /// Graph over the connections this walk saw
    pub fn graph(&self) -> TopologyGraph {
        TopologyGraph::from_connections(&self.connections)
    }
}

/// Parse a host address given by a caller
///
/// Unspecified, multicast and broadcast addresses cannot be discovered.
pub fn parse_address(text: &str) -> Result<IpAddr, ValidationError> {
    let address: IpAddr = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAddress(text.to_string()))?;
    validate_address(address)?;
    Ok(address)
}

fn validate_address(address: IpAddr) -> Result<(), ValidationError> {
    let broadcast = matches!(address, IpAddr::V4(v4) if v4.is_broadcast());
    if address.is_unspecified() || address.is_multicast() || broadcast {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

pub struct DiscoveryEngine {
    port: Arc<dyn ProtocolPort>,
    store: Arc<dyn PersistencePort>,
    strategy: Arc<DiscoveryStrategy>,
    reachability: Arc<dyn Reachability>,
    merger: ReconciliationMerger,
    config: EngineConfig,
}

impl DiscoveryEngine {
    pub fn new(
        port: Arc<dyn ProtocolPort>,
        store: Arc<dyn PersistencePort>,
        config: EngineConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let strategy = Arc::new(DiscoveryStrategy::for_kind(config.strategy, port.clone()));
        let reachability: Arc<dyn Reachability> = match config.precheck {
            PrecheckKind::Ping => Arc::new(PingReachability::new(config.ping_timeout_secs)),
            PrecheckKind::None => Arc::new(AssumeReachable),
        };
        Ok(Self {
            port,
            merger: ReconciliationMerger::new(store.clone()),
            store,
            strategy,
            reachability,
            config,
        })
    }

    /// Replace the configured pre-check
    pub fn with_reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Discover one address and merge it into the inventory
    pub async fn discover_device(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> Result<Device, EngineError> {
        validate_address(address)?;
        info!(address = %address, strategy = %self.strategy.kind(), "Discovering device");
        let result = self.strategy.discover(address, credentials).await?;
        let outcome = self.merger.merge(&result).await?;
        Ok(outcome.device)
    }

    /// Scan a subnet and merge every discovered host
    pub async fn discover_subnet(
        &self,
        cidr: &str,
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<BatchReport, EngineError> {
        let scanner = SubnetScanner::new(
            self.port.clone(),
            self.strategy.clone(),
            self.reachability.clone(),
            self.config.concurrency,
            self.config.max_hosts,
        );
        let scan = scanner.scan(cidr, credentials, cancel).await?;

        let (outcomes, merge_failures) = self.merger.merge_batch(&scan.results).await;
        let mut failures = scan.failures;
        failures.extend(
            merge_failures
                .into_iter()
                .map(|(address, e)| (address, DiscoveryError::from(e))),
        );
        failures.sort_by_key(|(address, _)| *address);

        Ok(BatchReport {
            devices: outcomes.into_iter().map(|o| o.device).collect(),
            failures,
            skipped: scan.skipped,
            cancelled: scan.cancelled,
        })
    }

    /// Walk outward from `seeds` and merge everything reached
    pub async fn discover_topology(
        &self,
        seeds: &[IpAddr],
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<TopologyReport, EngineError> {
        for seed in seeds {
            validate_address(*seed)?;
        }
        let walker = TopologyWalker::new(
            self.strategy.clone(),
            self.config.concurrency,
            self.config.max_devices,
            self.config.max_depth,
        );
        let walk = walker.walk(seeds, credentials, cancel).await?;

        let (outcomes, merge_failures) = self.merger.merge_batch(&walk.results).await;
        let mut failures = walk.failures;
        failures.extend(
            merge_failures
                .into_iter()
                .map(|(address, e)| (address, DiscoveryError::from(e))),
        );

        let connections = distinct_connections(&outcomes);
        Ok(TopologyReport {
            devices: outcomes.into_iter().map(|o| o.device).collect(),
            connections,
            failures,
            truncated: walk.truncated,
            cancelled: walk.cancelled,
        })
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, EngineError> {
        Ok(self.store.list_devices().await?)
    }

    /// Look a device up by id, management address or name
    pub async fn resolve_device(&self, key: &str) -> Result<Device, EngineError> {
        let key = key.trim();
        if let Ok(id) = key.parse::<DeviceId>() {
            if let Some(device) = self.store.get_device(id).await? {
                return Ok(device);
            }
        }
        if let Ok(address) = key.parse::<IpAddr>() {
            if let Some(device) = self.store.find_device_by_address(address).await? {
                return Ok(device);
            }
        }
        self.store
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| EngineError::UnknownDevice(key.to_string()))
    }

    /// Graph built fresh from the current inventory
    pub async fn topology(&self) -> Result<TopologyGraph, EngineError> {
        let snapshot = self.store.snapshot().await?;
        Ok(TopologyGraph::from_snapshot(&snapshot))
    }

    /// Every simple path between two devices
    pub async fn find_paths(
        &self,
        source: DeviceId,
        target: DeviceId,
    ) -> Result<Vec<Path>, EngineError> {
        self.require(source).await?;
        self.require(target).await?;
        Ok(self.topology().await?.paths(&source, &target))
    }

    /// Simple paths expanded per parallel link
    pub async fn find_link_paths(
        &self,
        source: DeviceId,
        target: DeviceId,
    ) -> Result<Vec<LinkPath>, EngineError> {
        self.require(source).await?;
        self.require(target).await?;
        Ok(self.topology().await?.link_paths(&source, &target))
    }

    pub async fn find_cycles(&self) -> Result<Vec<Path>, EngineError> {
        Ok(self.topology().await?.detect_cycles())
    }

    async fn require(&self, id: DeviceId) -> Result<(), EngineError> {
        match self.store.get_device(id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::UnknownDevice(id.to_string())),
        }
    }
}

fn distinct_connections(outcomes: &[MergeOutcome]) -> Vec<Connection> {
    let mut seen = HashSet::new();
    outcomes
        .iter()
        .flat_map(|o| o.connections.iter())
        .filter(|c| seen.insert(c.id))
        .cloned()
        .collect()
}
