//! The management-protocol port consumed by discovery

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use crate::oid::ObjectId;
use crate::value::SnmpValue;

/// Errors surfaced by a protocol port
///
/// `Timeout` is only returned once the port's own retry budget is spent;
/// callers must not retry on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("request timed out")]
    Timeout,
    #[error("authentication failed")]
    AuthFailure,
    #[error("{0}")]
    Other(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Path to value mapping returned by bulk reads and walks, in tree order
pub type VarBinds = BTreeMap<ObjectId, SnmpValue>;

/// Protocol version used for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    #[default]
    V2c,
}

/// Credentials passed through to the port untouched
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub version: SnmpVersion,
    pub community: String,
}

impl Credentials {
    pub fn v2c(community: &str) -> Self {
        Self {
            version: SnmpVersion::V2c,
            community: community.to_string(),
        }
    }

    pub fn v1(community: &str) -> Self {
        Self {
            version: SnmpVersion::V1,
            community: community.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("version", &self.version)
            .field("community", &"<redacted>")
            .finish()
    }
}

/// Read/write access to a single device's management tree
///
/// Implementations own timeouts and retries. Each call may open its own
/// session; implementations must not assume a session can be shared between
/// concurrent calls to the same address.
#[async_trait]
pub trait ProtocolPort: Send + Sync {
    /// Fetch a single instance; `Ok(None)` when the agent has no such object
    async fn get(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        credentials: &Credentials,
    ) -> ProtocolResult<Option<SnmpValue>>;

    /// Fetch several instances at once; missing objects are left out of the map
    async fn get_bulk(
        &self,
        address: IpAddr,
        oids: &[ObjectId],
        credentials: &Credentials,
    ) -> ProtocolResult<VarBinds>;

    /// Every object below `prefix`
    async fn walk(
        &self,
        address: IpAddr,
        prefix: &ObjectId,
        credentials: &Credentials,
    ) -> ProtocolResult<VarBinds>;

    async fn set(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        value: SnmpValue,
        credentials: &Credentials,
    ) -> ProtocolResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::v2c("s3cret");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("V2c"));
    }

    #[test]
    fn test_credentials_deserialize_default_version() {
        let creds: Credentials = serde_json::from_str(r#"{"community":"public"}"#).unwrap();
        assert_eq!(creds, Credentials::v2c("public"));

        let v1: Credentials =
            serde_json::from_str(r#"{"version":"v1","community":"ro"}"#).unwrap();
        assert_eq!(v1.version, SnmpVersion::V1);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ProtocolError::Timeout.to_string(), "request timed out");
        assert_eq!(
            ProtocolError::Other("noSuchName".into()).to_string(),
            "noSuchName"
        );
    }
}
