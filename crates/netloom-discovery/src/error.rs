//! Discovery and input-validation errors

use netloom_core::PersistenceError;
use netloom_snmp::ProtocolError;
use std::net::IpAddr;
use thiserror::Error;

/// Failure of one address's discovery
///
/// Only the mandatory steps produce this; failures of optional steps are
/// recorded on the `DiscoveryResult` instead.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("identity probe of {address} failed: {source}")]
    Identity {
        address: IpAddr,
        #[source]
        source: ProtocolError,
    },
    #[error("{address} does not answer management requests: {source}")]
    NotManageable {
        address: IpAddr,
        #[source]
        source: ProtocolError,
    },
    #[error("inventory update failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl DiscoveryError {
    /// The protocol failure behind this error, if any
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            DiscoveryError::Identity { source, .. } | DiscoveryError::NotManageable { source, .. } => {
                Some(source)
            }
            DiscoveryError::Persistence(_) => None,
        }
    }
}

/// Malformed caller input, rejected before any network traffic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),
    #[error("CIDR block {0} has no host addresses")]
    EmptyRange(String),
    #[error("CIDR block {cidr} has {hosts} hosts, more than the limit of {max}")]
    RangeTooLarge { cidr: String, hosts: u64, max: usize },
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("no seed addresses given")]
    EmptySeeds,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
