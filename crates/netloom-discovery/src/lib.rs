//! Netloom Discovery - Live discovery of devices and their adjacencies
//!
//! This crate drives discovery through a management-protocol port:
//! - Identity probing and interface-table reads
//! - LLDP and CDP neighbor strategies, combined by the composite strategy
//! - Subnet scanning and breadth-first topology walks with bounded concurrency
//! - Reconciliation of discovery results into the inventory
//! - `DiscoveryEngine`, the operation surface used by the daemon

pub mod cancel;
pub mod cdp;
pub mod classify;
pub mod composite;
pub mod engine;
pub mod error;
pub mod identity;
pub mod interfaces;
pub mod lldp;
pub mod mib;
pub mod reachability;
pub mod reconcile;
pub mod scanner;
pub mod strategy;
pub mod walker;

#[cfg(test)]
pub(crate) mod mock;

pub use cancel::{CancelHandle, CancelSignal};
pub use engine::{
    parse_address, BatchReport, DiscoveryEngine, EngineConfig, EngineError, TopologyReport,
};
pub use error::{DiscoveryError, ValidationError};
pub use identity::DeviceProbe;
pub use interfaces::InterfaceTableReader;
pub use reachability::{AssumeReachable, PingReachability, PrecheckKind, Reachability};
pub use reconcile::{MergeOutcome, ReconciliationMerger};
pub use scanner::{subnet_hosts, ScanReport, SubnetScanner};
pub use strategy::{DiscoveryStrategy, StrategyKind};
pub use walker::{TopologyWalker, WalkReport};
