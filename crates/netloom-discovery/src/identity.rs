//! Device identity probe over the SNMPv2-MIB system group

use netloom_core::DeviceIdentity;
use netloom_snmp::{Credentials, ProtocolError, ProtocolPort, ProtocolResult, VarBinds};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::classify;
use crate::mib;

/// Reads who a device is: description, object id, name, location, contact,
/// uptime and (when exposed) the chassis model
pub struct DeviceProbe {
    port: Arc<dyn ProtocolPort>,
}

impl DeviceProbe {
    pub fn new(port: Arc<dyn ProtocolPort>) -> Self {
        Self { port }
    }

    /// Probe one address
    ///
    /// Individual missing objects are left empty. An agent that answers but
    /// returns none of the identity objects is reported as `Other`.
    pub async fn probe(
        &self,
        address: IpAddr,
        credentials: &Credentials,
    ) -> ProtocolResult<DeviceIdentity> {
        let oids: Vec<_> = [
            mib::SYS_DESCR,
            mib::SYS_OBJECT_ID,
            mib::SYS_UPTIME,
            mib::SYS_CONTACT,
            mib::SYS_NAME,
            mib::SYS_LOCATION,
            mib::ENT_PHYSICAL_MODEL_NAME,
        ]
        .iter()
        .map(|oid| mib::oid(oid))
        .collect();

        let values = self.port.get_bulk(address, &oids, credentials).await?;
        trace!(address = %address, objects = values.len(), "Identity objects returned");

        if values.is_empty() {
            return Err(ProtocolError::Other(
                "agent returned no identity objects".to_string(),
            ));
        }

        let identity = identity_from_values(&values);
        debug!(
            address = %address,
            name = ?identity.name,
            device_type = %identity.device_type,
            "Probed device identity"
        );
        Ok(identity)
    }
}

fn text(values: &VarBinds, oid: &[u32]) -> Option<String> {
    values
        .get(&mib::oid(oid))
        .and_then(|v| v.as_text())
        .filter(|s| !s.is_empty())
}

fn identity_from_values(values: &VarBinds) -> DeviceIdentity {
    let description = text(values, mib::SYS_DESCR);
    let object_id = values
        .get(&mib::oid(mib::SYS_OBJECT_ID))
        .and_then(|v| v.as_object_id().cloned());

    let vendor = object_id
        .as_ref()
        .and_then(classify::vendor_from_object_id)
        .or_else(|| {
            description
                .as_deref()
                .and_then(classify::vendor_from_description)
        })
        .map(str::to_string);

    let device_type = description
        .as_deref()
        .map(classify::classify_device_type)
        .unwrap_or_default();

    DeviceIdentity {
        name: text(values, mib::SYS_NAME),
        object_id: object_id.map(|oid| oid.to_string()),
        location: text(values, mib::SYS_LOCATION),
        contact: text(values, mib::SYS_CONTACT),
        // Timeticks are hundredths of a second
        uptime_secs: values
            .get(&mib::oid(mib::SYS_UPTIME))
            .and_then(|v| v.as_u64())
            .map(|ticks| ticks / 100),
        vendor,
        model: text(values, mib::ENT_PHYSICAL_MODEL_NAME),
        os_version: description.as_deref().and_then(classify::os_version),
        device_type,
        description,
    }
}
