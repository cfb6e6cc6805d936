//! Liveness pre-checks run before any management-protocol traffic

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::trace;

/// Which pre-check a scan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecheckKind {
    #[default]
    Ping,
    /// Skip the pre-check and go straight to the canary request
    None,
}

#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, address: IpAddr) -> bool;
}

/// One ICMP echo through the system `ping` binary
#[derive(Debug, Clone)]
pub struct PingReachability {
    timeout_secs: u32,
}

impl PingReachability {
    pub fn new(timeout_secs: u32) -> Self {
        Self {
            timeout_secs: timeout_secs.max(1),
        }
    }
}

impl Default for PingReachability {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Reachability for PingReachability {
    async fn is_reachable(&self, address: IpAddr) -> bool {
        let result = tokio::process::Command::new("ping")
            .args(["-c", "1", "-W", &self.timeout_secs.to_string(), &address.to_string()])
            .output()
            .await;

        let reachable = matches!(result, Ok(ref output) if output.status.success());
        trace!(address = %address, reachable, "Ping pre-check");
        reachable
    }
}

/// Treats every address as alive
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeReachable;

#[async_trait]
impl Reachability for AssumeReachable {
    async fn is_reachable(&self, _address: IpAddr) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_assume_reachable() {
        assert!(
            AssumeReachable
                .is_reachable(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
                .await
        );
    }

    #[test]
    fn test_precheck_kind_names() {
        let kind: PrecheckKind = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(kind, PrecheckKind::None);
        assert_eq!(PrecheckKind::default(), PrecheckKind::Ping);
    }
}
