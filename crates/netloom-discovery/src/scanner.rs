//! Subnet scanner: pre-check, canary request, then full discovery per host

use ipnetwork::IpNetwork;
use netloom_core::DiscoveryResult;
use netloom_snmp::{Credentials, ProtocolError, ProtocolPort};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{DiscoveryError, ValidationError};
use crate::mib;
use crate::reachability::Reachability;
use crate::strategy::DiscoveryStrategy;

/// Outcome of one scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub results: Vec<DiscoveryResult>,
    /// Every host that yielded no result, including those behind `skipped`
    pub failures: Vec<(IpAddr, DiscoveryError)>,
    /// Hosts that failed the liveness pre-check and saw no protocol traffic
    pub skipped: Vec<IpAddr>,
    /// True if cancellation stopped the scan before every host was started
    pub cancelled: bool,
}

enum HostOutcome {
    Discovered(DiscoveryResult),
    Failed(IpAddr, DiscoveryError),
    Skipped(IpAddr),
}

/// Host addresses of an IPv4 block, network and broadcast excluded
///
/// /31 and /32 blocks have no such hosts and are rejected, as are blocks
/// with more than `max_hosts` hosts.
pub fn subnet_hosts(cidr: &str, max_hosts: usize) -> Result<Vec<Ipv4Addr>, ValidationError> {
    let network: IpNetwork = cidr
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidCidr(cidr.to_string()))?;

    let IpNetwork::V4(block) = network else {
        return Err(ValidationError::Unsupported(format!(
            "IPv6 subnet scan of {}",
            cidr
        )));
    };

    let network = u32::from(block.network());
    let broadcast = u32::from(block.broadcast());
    if broadcast.saturating_sub(network) < 2 {
        return Err(ValidationError::EmptyRange(cidr.to_string()));
    }

    let hosts = u64::from(broadcast - network - 1);
    if hosts > max_hosts as u64 {
        return Err(ValidationError::RangeTooLarge {
            cidr: cidr.to_string(),
            hosts,
            max: max_hosts,
        });
    }

    Ok(((network + 1)..broadcast).map(Ipv4Addr::from).collect())
}

pub struct SubnetScanner {
    port: Arc<dyn ProtocolPort>,
    strategy: Arc<DiscoveryStrategy>,
    reachability: Arc<dyn Reachability>,
    concurrency: usize,
    max_hosts: usize,
}

impl SubnetScanner {
    pub fn new(
        port: Arc<dyn ProtocolPort>,
        strategy: Arc<DiscoveryStrategy>,
        reachability: Arc<dyn Reachability>,
        concurrency: usize,
        max_hosts: usize,
    ) -> Self {
        Self {
            port,
            strategy,
            reachability,
            concurrency: concurrency.max(1),
            max_hosts,
        }
    }

    /// Scan every host of `cidr`
    ///
    /// At most `concurrency` hosts are in flight at once. A failing host is
    /// recorded and never aborts the scan.
    pub async fn scan(
        &self,
        cidr: &str,
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<ScanReport, ValidationError> {
        let hosts = subnet_hosts(cidr, self.max_hosts)?;
        info!(cidr = %cidr, hosts = hosts.len(), "Starting subnet scan");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut report = ScanReport::default();
        let mut watcher = cancel.clone();

        for host in hosts {
            let permit = tokio::select! {
                biased;
                _ = watcher.cancelled() => {
                    info!(cidr = %cidr, "Scan cancelled, draining in-flight hosts");
                    report.cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let address = IpAddr::V4(host);
            let port = self.port.clone();
            let strategy = self.strategy.clone();
            let reachability = self.reachability.clone();
            let credentials = credentials.clone();
            tasks.spawn(async move {
                let outcome =
                    scan_host(address, &*port, &strategy, &*reachability, &credentials).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(HostOutcome::Discovered(result)) => report.results.push(result),
                Ok(HostOutcome::Failed(address, e)) => report.failures.push((address, e)),
                Ok(HostOutcome::Skipped(address)) => {
                    report.skipped.push(address);
                    report.failures.push((
                        address,
                        DiscoveryError::NotManageable {
                            address,
                            source: ProtocolError::Timeout,
                        },
                    ));
                }
                Err(e) => warn!(error = %e, "Scan task panicked"),
            }
        }

        report.results.sort_by_key(|r| r.address);
        report.failures.sort_by_key(|(address, _)| *address);
        report.skipped.sort();

        info!(
            cidr = %cidr,
            discovered = report.results.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "Subnet scan complete"
        );
        Ok(report)
    }
}

async fn scan_host(
    address: IpAddr,
    port: &dyn ProtocolPort,
    strategy: &DiscoveryStrategy,
    reachability: &dyn Reachability,
    credentials: &Credentials,
) -> HostOutcome {
    if !reachability.is_reachable(address).await {
        return HostOutcome::Skipped(address);
    }

    // Canary: any answer, even "no such object", proves an agent is listening
    if let Err(source) = port
        .get(address, &mib::oid(mib::SYS_OBJECT_ID), credentials)
        .await
    {
        debug!(address = %address, error = %source, "Canary request failed");
        return HostOutcome::Failed(address, DiscoveryError::NotManageable { address, source });
    }

    match strategy.discover(address, credentials).await {
        Ok(result) => HostOutcome::Discovered(result),
        Err(e) => {
            debug!(address = %address, error = %e, "Discovery failed");
            HostOutcome::Failed(address, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::mock::{ip, MockDevice, MockPort};
    use crate::reachability::AssumeReachable;
    use crate::strategy::StrategyKind;
    use async_trait::async_trait;
    use proptest::prelude::*;

    fn scanner(port: MockPort, reachability: Arc<dyn Reachability>) -> SubnetScanner {
        let port: Arc<dyn ProtocolPort> = Arc::new(port);
        let strategy = Arc::new(DiscoveryStrategy::for_kind(StrategyKind::Composite, port.clone()));
        SubnetScanner::new(port, strategy, reachability, 4, 1024)
    }

    struct OnlyReachable(Vec<IpAddr>);

    #[async_trait]
    impl Reachability for OnlyReachable {
        async fn is_reachable(&self, address: IpAddr) -> bool {
            self.0.contains(&address)
        }
    }

    #[test]
    fn test_subnet_hosts_exclude_network_and_broadcast() {
        let hosts = subnet_hosts("192.0.2.0/30", 1024).unwrap();
        assert_eq!(hosts, vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)]);

        // Host bits in the input are ignored
        let hosts = subnet_hosts("10.1.1.77/29", 1024).unwrap();
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(10, 1, 1, 73)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 1, 1, 78)));
    }

    #[test]
    fn test_subnet_hosts_rejects_bad_input() {
        assert!(matches!(subnet_hosts("not-a-cidr", 10), Err(ValidationError::InvalidCidr(_))));
        assert!(matches!(subnet_hosts("10.0.0.0/31", 10), Err(ValidationError::EmptyRange(_))));
        assert!(matches!(subnet_hosts("10.0.0.1/32", 10), Err(ValidationError::EmptyRange(_))));
        assert!(matches!(
            subnet_hosts("10.0.0.0/16", 1024),
            Err(ValidationError::RangeTooLarge { hosts: 65534, .. })
        ));
        assert!(matches!(
            subnet_hosts("2001:db8::/120", 1024),
            Err(ValidationError::Unsupported(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_hosts_never_include_network_or_broadcast(raw in any::<u32>(), prefix in 20u8..=30) {
            let base = Ipv4Addr::from(raw);
            let cidr = format!("{}/{}", base, prefix);
            let hosts = subnet_hosts(&cidr, usize::MAX).unwrap();
            let mask = u32::MAX << (32 - prefix);
            let network = raw & mask;
            let broadcast = network | !mask;
            prop_assert_eq!(hosts.len() as u64, u64::from(broadcast - network) - 1);
            prop_assert!(!hosts.contains(&Ipv4Addr::from(network)));
            prop_assert!(!hosts.contains(&Ipv4Addr::from(broadcast)));
            prop_assert!(hosts.iter().all(|h| u32::from(*h) & mask == network));
        }
    }

    #[tokio::test]
    async fn test_scan_reports_success_and_timeout() {
        let port = MockPort::new().with_device(
            MockDevice::new([192, 0, 2, 1], "edge1", "Cisco router").interface(1, "Gi0/0"),
        );
        let scanner = scanner(port, Arc::new(AssumeReachable));

        let report = scanner
            .scan("192.0.2.0/30", &Credentials::v2c("public"), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].address, ip([192, 0, 2, 1]));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, ip([192, 0, 2, 2]));
        assert_eq!(report.failures[0].1.protocol_error(), Some(&ProtocolError::Timeout));
        assert!(report.skipped.is_empty());
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_unreachable_hosts_are_skipped_without_requests() {
        let port = Arc::new(
            MockPort::new().with_device(MockDevice::new([192, 0, 2, 1], "edge1", "router")),
        );
        let dyn_port: Arc<dyn ProtocolPort> = port.clone();
        let strategy = Arc::new(DiscoveryStrategy::for_kind(StrategyKind::Snmp, dyn_port.clone()));
        let scanner = SubnetScanner::new(
            dyn_port,
            strategy,
            Arc::new(OnlyReachable(vec![ip([192, 0, 2, 1])])),
            2,
            1024,
        );

        let report = scanner
            .scan("192.0.2.0/29", &Credentials::v2c("public"), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.skipped.len(), 5);
        // Silent hosts are still reported as timed-out failures
        assert_eq!(report.failures.len(), 5);
        assert!(report
            .failures
            .iter()
            .all(|(_, e)| e.protocol_error() == Some(&ProtocolError::Timeout)));
        assert_eq!(report.failures[0].0, ip([192, 0, 2, 2]));
        // Only the live host saw protocol traffic
        assert!(port.was_contacted(ip([192, 0, 2, 1])));
        assert!(!port.was_contacted(ip([192, 0, 2, 2])));
        assert!(!port.was_contacted(ip([192, 0, 2, 6])));
    }

    #[tokio::test]
    async fn test_cancelled_scan_starts_nothing() {
        let scanner = scanner(MockPort::new(), Arc::new(AssumeReachable));
        let handle = CancelHandle::new();
        handle.cancel();

        let report = scanner
            .scan("192.0.2.0/24", &Credentials::v2c("public"), &handle.signal())
            .await
            .unwrap();
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_scan_stops_new_hosts() {
        let handle = CancelHandle::new();
        let port = Arc::new(
            MockPort::new()
                .with_device(MockDevice::new([192, 0, 2, 1], "edge1", "router").interface(1, "Gi0/0"))
                .with_device(MockDevice::new([192, 0, 2, 2], "edge2", "router"))
                .cancel_on_contact(handle.clone()),
        );
        let dyn_port: Arc<dyn ProtocolPort> = port.clone();
        let strategy = Arc::new(DiscoveryStrategy::for_kind(StrategyKind::Composite, dyn_port.clone()));
        let scanner = SubnetScanner::new(dyn_port, strategy, Arc::new(AssumeReachable), 1, 1024);

        let report = scanner
            .scan("192.0.2.0/29", &Credentials::v2c("public"), &handle.signal())
            .await
            .unwrap();

        assert!(report.cancelled);
        // The host in flight when the signal rose still completes
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].address, ip([192, 0, 2, 1]));
        assert!(!port.was_contacted(ip([192, 0, 2, 2])));
        assert_eq!(port.contacted_count(), 1);
    }
}
