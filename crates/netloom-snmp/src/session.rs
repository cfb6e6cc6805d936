//! SNMP v1/v2c implementation of the protocol port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snmp2::{AsyncSession, Oid, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::oid::ObjectId;
use crate::port::{
    Credentials, ProtocolError, ProtocolPort, ProtocolResult, SnmpVersion, VarBinds,
};
use crate::value::SnmpValue;

/// Standard SNMP agent port
pub const SNMP_PORT: u16 = 161;

/// PDU error-status codes we act on
const ERR_NO_SUCH_NAME: u32 = 2;
const ERR_NO_ACCESS: u32 = 6;
const ERR_AUTHORIZATION: u32 = 16;

/// Walks stop after this many rows even if the agent keeps answering
const MAX_WALK_ROWS: usize = 100_000;

/// Per-request transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Agent UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout for a single request attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts after the first one times out
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Rows requested per GETBULK during a walk (v2c only)
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: u32,
}

fn default_port() -> u16 {
    SNMP_PORT
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_retries() -> u32 {
    1
}

fn default_max_repetitions() -> u32 {
    25
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            max_repetitions: default_max_repetitions(),
        }
    }
}

/// Protocol port speaking SNMP over UDP
///
/// Every port call opens its own session so concurrent calls never share
/// request-id state or a socket.
#[derive(Debug, Clone, Default)]
pub struct SnmpPort {
    config: SessionConfig,
}

impl SnmpPort {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Decoded response: error status plus varbinds, where `None` marks an
/// exception value (noSuchObject, noSuchInstance, endOfMibView)
struct Response {
    error_status: u32,
    varbinds: Vec<(ObjectId, Option<SnmpValue>)>,
}

enum Request<'a> {
    Get,
    GetNext,
    GetBulk,
    Set(&'a SnmpValue),
}

struct Session {
    inner: AsyncSession,
    target: SocketAddr,
    version: SnmpVersion,
    timeout: Duration,
    retries: u32,
    max_repetitions: u32,
}

impl Session {
    async fn open(
        address: IpAddr,
        credentials: &Credentials,
        config: &SessionConfig,
    ) -> ProtocolResult<Self> {
        let target = SocketAddr::new(address, config.port);
        let community = credentials.community.as_bytes();
        let opened = match credentials.version {
            SnmpVersion::V1 => AsyncSession::new_v1(target, community, 0).await,
            SnmpVersion::V2c => AsyncSession::new_v2c(target, community, 0).await,
        };
        let inner = opened.map_err(|e| {
            ProtocolError::Other(format!("failed to open session to {}: {}", target, e))
        })?;

        Ok(Self {
            inner,
            target,
            version: credentials.version,
            timeout: Duration::from_millis(config.timeout_ms),
            retries: config.retries,
            max_repetitions: config.max_repetitions.max(1),
        })
    }

    /// Send one request, retrying on timeout until the budget is spent
    async fn request(&mut self, oid: &ObjectId, request: Request<'_>) -> ProtocolResult<Response> {
        let wire_oid = to_wire_oid(oid)?;
        let mut attempt = 0u32;

        loop {
            let outcome = timeout(
                self.timeout,
                dispatch(&mut self.inner, &wire_oid, &request, self.max_repetitions),
            )
            .await;

            match outcome {
                Ok(result) => return result,
                Err(_) if attempt < self.retries => {
                    attempt += 1;
                    trace!(target = %self.target, oid = %oid, attempt, "Request timed out, retrying");
                }
                Err(_) => {
                    debug!(target = %self.target, oid = %oid, "Retry budget exhausted");
                    return Err(ProtocolError::Timeout);
                }
            }
        }
    }

    async fn get(&mut self, oid: &ObjectId) -> ProtocolResult<Option<SnmpValue>> {
        let response = self.request(oid, Request::Get).await?;
        if response.error_status == ERR_NO_SUCH_NAME {
            return Ok(None);
        }
        Ok(response
            .varbinds
            .into_iter()
            .find(|(returned, _)| returned == oid)
            .and_then(|(_, value)| value))
    }

    async fn walk(&mut self, prefix: &ObjectId) -> ProtocolResult<VarBinds> {
        let mut rows = VarBinds::new();
        let mut cursor = prefix.clone();

        loop {
            let request = match self.version {
                SnmpVersion::V1 => Request::GetNext,
                SnmpVersion::V2c => Request::GetBulk,
            };
            let response = self.request(&cursor, request).await?;
            if response.error_status == ERR_NO_SUCH_NAME || response.varbinds.is_empty() {
                break;
            }

            for (oid, value) in response.varbinds {
                let Some(value) = value else {
                    return Ok(rows);
                };
                if !oid.starts_with(prefix) {
                    return Ok(rows);
                }
                if oid <= cursor {
                    return Err(ProtocolError::Other(format!(
                        "agent at {} returned non-increasing object {}",
                        self.target, oid
                    )));
                }
                cursor = oid.clone();
                rows.insert(oid, value);
            }

            if rows.len() >= MAX_WALK_ROWS {
                debug!(target = %self.target, prefix = %prefix, "Walk row limit reached");
                break;
            }
        }

        Ok(rows)
    }
}

async fn dispatch(
    session: &mut AsyncSession,
    oid: &Oid<'static>,
    request: &Request<'_>,
    max_repetitions: u32,
) -> ProtocolResult<Response> {
    match request {
        Request::Get => {
            let pdu = session.get(oid).await.map_err(wire_error)?;
            decode(pdu.error_status as u32, pdu.varbinds)
        }
        Request::GetNext => {
            let pdu = session.getnext(oid).await.map_err(wire_error)?;
            decode(pdu.error_status as u32, pdu.varbinds)
        }
        Request::GetBulk => {
            let pdu = session
                .getbulk(&[oid], 0, max_repetitions)
                .await
                .map_err(wire_error)?;
            decode(pdu.error_status as u32, pdu.varbinds)
        }
        Request::Set(value) => {
            let wire_value = to_wire_value(value)?;
            let pdu = session
                .set(&[(oid, wire_value)])
                .await
                .map_err(wire_error)?;
            let response = decode(pdu.error_status as u32, pdu.varbinds)?;
            if response.error_status == ERR_NO_SUCH_NAME {
                return Err(ProtocolError::Other("no such object".to_string()));
            }
            Ok(response)
        }
    }
}

fn decode<'a>(
    error_status: u32,
    varbinds: impl Iterator<Item = (Oid<'a>, Value<'a>)>,
) -> ProtocolResult<Response> {
    match error_status {
        0 | ERR_NO_SUCH_NAME => {}
        ERR_NO_ACCESS | ERR_AUTHORIZATION => return Err(ProtocolError::AuthFailure),
        other => {
            return Err(ProtocolError::Other(format!(
                "agent returned error status {}",
                other
            )))
        }
    }

    let mut decoded = Vec::new();
    for (oid, value) in varbinds {
        let Some(oid) = from_wire_oid(&oid) else {
            continue;
        };
        decoded.push((oid, from_wire_value(&value)));
    }

    Ok(Response {
        error_status,
        varbinds: decoded,
    })
}

fn wire_error(e: snmp2::Error) -> ProtocolError {
    ProtocolError::Other(format!("snmp error: {:?}", e))
}

fn to_wire_oid(oid: &ObjectId) -> ProtocolResult<Oid<'static>> {
    let components: Vec<u64> = oid.as_slice().iter().map(|c| u64::from(*c)).collect();
    Oid::from(components.as_slice()).map_err(|_| {
        ProtocolError::Other(format!("object identifier {} cannot be encoded", oid))
    })
}

fn from_wire_oid(oid: &Oid<'_>) -> Option<ObjectId> {
    oid.iter()?
        .map(|component| u32::try_from(component).ok())
        .collect::<Option<Vec<_>>>()
        .map(ObjectId::new)
}

fn from_wire_value(value: &Value<'_>) -> Option<SnmpValue> {
    match value {
        Value::Integer(i) => Some(SnmpValue::Integer(*i)),
        Value::OctetString(bytes) => Some(SnmpValue::OctetString(bytes.to_vec())),
        Value::ObjectIdentifier(oid) => from_wire_oid(oid).map(SnmpValue::ObjectId),
        Value::IpAddress(octets) => Some(SnmpValue::IpAddress(Ipv4Addr::from(*octets))),
        Value::Counter32(v) => Some(SnmpValue::Counter32(*v)),
        Value::Unsigned32(v) => Some(SnmpValue::Unsigned32(*v)),
        Value::Timeticks(v) => Some(SnmpValue::Timeticks(*v)),
        Value::Counter64(v) => Some(SnmpValue::Counter64(*v)),
        Value::Boolean(b) => Some(SnmpValue::Boolean(*b)),
        Value::Null => Some(SnmpValue::Null),
        // noSuchObject, noSuchInstance, endOfMibView and opaque containers
        _ => None,
    }
}

fn to_wire_value(value: &SnmpValue) -> ProtocolResult<Value<'_>> {
    let wire = match value {
        SnmpValue::Integer(i) => Value::Integer(*i),
        SnmpValue::OctetString(bytes) => Value::OctetString(bytes),
        SnmpValue::ObjectId(oid) => Value::ObjectIdentifier(to_wire_oid(oid)?),
        SnmpValue::IpAddress(ip) => Value::IpAddress(ip.octets()),
        SnmpValue::Counter32(v) => Value::Counter32(*v),
        SnmpValue::Unsigned32(v) => Value::Unsigned32(*v),
        SnmpValue::Timeticks(v) => Value::Timeticks(*v),
        SnmpValue::Counter64(v) => Value::Counter64(*v),
        SnmpValue::Boolean(b) => Value::Boolean(*b),
        SnmpValue::Null => Value::Null,
    };
    Ok(wire)
}

#[async_trait]
impl ProtocolPort for SnmpPort {
    async fn get(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        credentials: &Credentials,
    ) -> ProtocolResult<Option<SnmpValue>> {
        let mut session = Session::open(address, credentials, &self.config).await?;
        session.get(oid).await
    }

    async fn get_bulk(
        &self,
        address: IpAddr,
        oids: &[ObjectId],
        credentials: &Credentials,
    ) -> ProtocolResult<VarBinds> {
        // Issued as individual GETs over one session: agents disagree on
        // partial multi-varbind GET semantics, single GETs do not.
        let mut session = Session::open(address, credentials, &self.config).await?;
        let mut values = VarBinds::new();
        for oid in oids {
            if let Some(value) = session.get(oid).await? {
                values.insert(oid.clone(), value);
            }
        }
        Ok(values)
    }

    async fn walk(
        &self,
        address: IpAddr,
        prefix: &ObjectId,
        credentials: &Credentials,
    ) -> ProtocolResult<VarBinds> {
        let mut session = Session::open(address, credentials, &self.config).await?;
        let rows = session.walk(prefix).await?;
        trace!(address = %address, prefix = %prefix, rows = rows.len(), "Walk complete");
        Ok(rows)
    }

    async fn set(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        value: SnmpValue,
        credentials: &Credentials,
    ) -> ProtocolResult<()> {
        let mut session = Session::open(address, credentials, &self.config).await?;
        session.request(oid, Request::Set(&value)).await?;
        debug!(address = %address, oid = %oid, "Set complete");
        Ok(())
    }
}
