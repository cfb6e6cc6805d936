//! Typed values returned by the management tree

use std::fmt;
use std::net::Ipv4Addr;

use crate::oid::ObjectId;

/// A decoded value from the management tree
///
/// Owned counterpart of the wire-level value so results can outlive the
/// session that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(ObjectId),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    Boolean(bool),
    Null,
}

impl SnmpValue {
    /// Convenience constructor for text values
    pub fn text(s: &str) -> Self {
        SnmpValue::OctetString(s.as_bytes().to_vec())
    }

    /// Numeric view of integer-like values
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Integer(i) => u64::try_from(*i).ok(),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) | SnmpValue::Timeticks(v) => {
                Some(u64::from(*v))
            }
            SnmpValue::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(i) => Some(*i),
            other => other.as_u64().and_then(|v| i64::try_from(v).ok()),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text view of the value; octet strings are decoded lossily with
    /// trailing NULs and whitespace stripped
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                Some(text.trim_end_matches('\0').trim().to_string())
            }
            SnmpValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// True for octet strings made only of printable ASCII
    pub fn is_printable(&self) -> bool {
        match self {
            SnmpValue::OctetString(bytes) => {
                !bytes.is_empty()
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_graphic() || *b == b' ' || *b == 0)
            }
            _ => false,
        }
    }

    /// Colon-separated hex rendering of an octet string, `None` when empty
    pub fn as_mac(&self) -> Option<String> {
        let bytes = self.as_bytes()?;
        if bytes.is_empty() {
            return None;
        }
        Some(
            bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
        )
    }

    /// IPv4 view: either an IpAddress value or a 4-byte octet string
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            SnmpValue::IpAddress(ip) => Some(*ip),
            SnmpValue::OctetString(bytes) if bytes.len() == 4 => {
                Some(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
            }
            SnmpValue::OctetString(bytes) => {
                // Some agents render the address as dotted text
                std::str::from_utf8(bytes).ok()?.trim().parse().ok()
            }
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            SnmpValue::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Integer(i) => write!(f, "{}", i),
            SnmpValue::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            SnmpValue::ObjectId(oid) => write!(f, "{}", oid),
            SnmpValue::IpAddress(ip) => write!(f, "{}", ip),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) | SnmpValue::Timeticks(v) => {
                write!(f, "{}", v)
            }
            SnmpValue::Counter64(v) => write!(f, "{}", v),
            SnmpValue::Boolean(b) => write!(f, "{}", b),
            SnmpValue::Null => f.write_str("null"),
        }
    }
}
