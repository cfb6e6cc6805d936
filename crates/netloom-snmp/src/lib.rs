//! Netloom SNMP - Management-protocol access for discovery
//!
//! This crate defines the port the discovery engine talks through:
//! - Object identifiers and typed values of a device's management tree
//! - The `ProtocolPort` trait (GET / GET-BULK / WALK / SET)
//! - `SnmpPort`, an SNMP v1/v2c implementation with per-call sessions,
//!   explicit timeouts and a caller-supplied retry budget

pub mod oid;
pub mod port;
pub mod session;
pub mod value;

pub use oid::{ObjectId, OidParseError};
pub use port::{Credentials, ProtocolError, ProtocolPort, ProtocolResult, SnmpVersion, VarBinds};
pub use session::{SessionConfig, SnmpPort, SNMP_PORT};
pub use value::SnmpValue;
