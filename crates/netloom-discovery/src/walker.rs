//! Breadth-first topology walk over live neighbor tables

use netloom_core::DiscoveryResult;
use netloom_snmp::Credentials;
use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{DiscoveryError, ValidationError};
use crate::strategy::DiscoveryStrategy;

/// Outcome of one walk
#[derive(Debug, Default)]
pub struct WalkReport {
    pub results: Vec<DiscoveryResult>,
    pub failures: Vec<(IpAddr, DiscoveryError)>,
    /// True if the device or depth bound left reachable addresses unvisited
    pub truncated: bool,
    pub cancelled: bool,
}

pub struct TopologyWalker {
    strategy: Arc<DiscoveryStrategy>,
    concurrency: usize,
    max_devices: usize,
    max_depth: usize,
}

impl TopologyWalker {
    pub fn new(
        strategy: Arc<DiscoveryStrategy>,
        concurrency: usize,
        max_devices: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            strategy,
            concurrency: concurrency.max(1),
            max_devices: max_devices.max(1),
            max_depth,
        }
    }

    /// Walk outward from `seeds` until the frontier is empty
    ///
    /// An address is queued at most once per walk. Addresses configured on
    /// an already-discovered device's interfaces count as visited, so a
    /// device is not walked again through a second address. At most
    /// `max_devices` addresses are discovered, none further than
    /// `max_depth` hops from a seed.
    pub async fn walk(
        &self,
        seeds: &[IpAddr],
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<WalkReport, ValidationError> {
        if seeds.is_empty() {
            return Err(ValidationError::EmptySeeds);
        }

        let mut visited: HashSet<IpAddr> = HashSet::new();
        let mut frontier: VecDeque<(IpAddr, usize)> = VecDeque::new();
        for seed in seeds {
            if visited.insert(*seed) {
                frontier.push_back((*seed, 0));
            }
        }
        info!(seeds = frontier.len(), max_devices = self.max_devices, max_depth = self.max_depth, "Starting topology walk");

        let mut report = WalkReport::default();
        let mut tasks = JoinSet::new();
        let mut launched = 0usize;

        loop {
            while tasks.len() < self.concurrency && !report.cancelled {
                if cancel.is_cancelled() {
                    info!("Walk cancelled, draining in-flight discoveries");
                    report.cancelled = true;
                    break;
                }
                let Some((address, depth)) = frontier.pop_front() else {
                    break;
                };
                if launched >= self.max_devices {
                    debug!(pending = frontier.len() + 1, "Device bound reached");
                    report.truncated = true;
                    frontier.clear();
                    break;
                }
                launched += 1;

                let strategy = self.strategy.clone();
                let credentials = credentials.clone();
                tasks.spawn(async move {
                    let outcome = strategy.discover(address, &credentials).await;
                    (address, depth, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((_, depth, Ok(result))) => {
                    self.expand(&result, depth, &mut visited, &mut frontier, &mut report);
                    report.results.push(result);
                }
                Ok((address, _, Err(e))) => {
                    debug!(address = %address, error = %e, "Walk discovery failed");
                    report.failures.push((address, e));
                }
                Err(e) => warn!(error = %e, "Walk task panicked"),
            }
        }

        info!(
            discovered = report.results.len(),
            failed = report.failures.len(),
            truncated = report.truncated,
            cancelled = report.cancelled,
            "Topology walk complete"
        );
        Ok(report)
    }

    /// Queue the unvisited neighbors of a freshly discovered device
    fn expand(
        &self,
        result: &DiscoveryResult,
        depth: usize,
        visited: &mut HashSet<IpAddr>,
        frontier: &mut VecDeque<(IpAddr, usize)>,
        report: &mut WalkReport,
    ) {
        let aliases: HashSet<IpAddr> = result
            .interface_addresses()
            .filter(|a| *a != result.address)
            .collect();
        if !aliases.is_empty() {
            frontier.retain(|(address, _)| !aliases.contains(address));
            visited.extend(aliases);
        }

        for neighbor in result.neighbor_addresses() {
            if visited.contains(&neighbor) {
                continue;
            }
            if depth >= self.max_depth {
                report.truncated = true;
                continue;
            }
            visited.insert(neighbor);
            frontier.push_back((neighbor, depth + 1));
        }
    }
}
