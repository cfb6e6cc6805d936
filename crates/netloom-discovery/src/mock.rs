//! Scriptable in-memory protocol port for tests

use async_trait::async_trait;
use netloom_snmp::{
    Credentials, ObjectId, ProtocolError, ProtocolPort, ProtocolResult, SnmpValue, VarBinds,
};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use crate::cancel::CancelHandle;
use crate::mib;

pub fn ip(a: [u8; 4]) -> IpAddr {
    IpAddr::V4(Ipv4Addr::from(a))
}

/// Object tree of one simulated device
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub address: IpAddr,
    pub values: VarBinds,
}

impl MockDevice {
    /// A Cisco-looking device with the system group filled in
    pub fn new(address: [u8; 4], name: &str, description: &str) -> Self {
        let device = Self {
            address: ip(address),
            values: VarBinds::new(),
        };
        device
            .set(mib::SYS_DESCR, SnmpValue::text(description))
            .set(
                mib::SYS_OBJECT_ID,
                SnmpValue::ObjectId(ObjectId::new(vec![1, 3, 6, 1, 4, 1, 9, 1, 1208])),
            )
            .set(mib::SYS_NAME, SnmpValue::text(name))
            .set(mib::SYS_UPTIME, SnmpValue::Timeticks(360_000))
    }

    pub fn set(mut self, oid: &[u32], value: SnmpValue) -> Self {
        self.values.insert(mib::oid(oid), value);
        self
    }

    fn set_column(mut self, column: &[u32], index: &[u32], value: SnmpValue) -> Self {
        self.values.insert(mib::oid(column).join(index), value);
        self
    }

    /// An up 1G ethernet interface
    pub fn interface(self, index: u32, name: &str) -> Self {
        self.set_column(mib::IF_NAME, &[index], SnmpValue::text(name))
            .set_column(mib::IF_DESCR, &[index], SnmpValue::text(name))
            .set_column(mib::IF_TYPE, &[index], SnmpValue::Integer(6))
            .set_column(mib::IF_MTU, &[index], SnmpValue::Integer(1500))
            .set_column(mib::IF_SPEED, &[index], SnmpValue::Counter32(1_000_000_000))
            .set_column(mib::IF_ADMIN_STATUS, &[index], SnmpValue::Integer(1))
            .set_column(mib::IF_OPER_STATUS, &[index], SnmpValue::Integer(1))
    }

    pub fn lldp_neighbor(
        self,
        local_port: u32,
        rem_index: u32,
        remote_name: &str,
        remote_port: &str,
        remote_address: Option<[u8; 4]>,
    ) -> Self {
        let row = [0, local_port, rem_index];
        let column = |c: u32| {
            let mut oid = mib::LLDP_REM_ENTRY.to_vec();
            oid.push(c);
            oid
        };
        let mut device = self
            .set_column(&column(mib::LLDP_REM_CHASSIS_ID_SUBTYPE), &row, SnmpValue::Integer(4))
            .set_column(
                &column(mib::LLDP_REM_CHASSIS_ID),
                &row,
                SnmpValue::OctetString(vec![0x00, 0x11, 0x22, 0x33, 0x44, rem_index as u8]),
            )
            .set_column(&column(mib::LLDP_REM_PORT_ID_SUBTYPE), &row, SnmpValue::Integer(5))
            .set_column(&column(mib::LLDP_REM_PORT_ID), &row, SnmpValue::text(remote_port))
            .set_column(&column(mib::LLDP_REM_SYS_NAME), &row, SnmpValue::text(remote_name));
        if let Some(addr) = remote_address {
            // lldpRemManAddrIfSubtype column, indexed by the address
            let mut index = row.to_vec();
            index.extend([mib::ADDRESS_FAMILY_IPV4, 4]);
            index.extend(addr.iter().map(|b| u32::from(*b)));
            let mut entry = mib::LLDP_REM_MAN_ADDR_ENTRY.to_vec();
            entry.push(3);
            device = device.set_column(&entry, &index, SnmpValue::Integer(2));
        }
        device
    }

    pub fn cdp_neighbor(
        self,
        if_index: u32,
        dev_index: u32,
        remote_name: &str,
        remote_port: &str,
        remote_address: Option<[u8; 4]>,
    ) -> Self {
        let row = [if_index, dev_index];
        let column = |c: u32| {
            let mut oid = mib::CDP_CACHE_ENTRY.to_vec();
            oid.push(c);
            oid
        };
        let mut device = self
            .set_column(&column(mib::CDP_CACHE_DEVICE_ID), &row, SnmpValue::text(remote_name))
            .set_column(&column(mib::CDP_CACHE_DEVICE_PORT), &row, SnmpValue::text(remote_port))
            .set_column(
                &column(mib::CDP_CACHE_PLATFORM),
                &row,
                SnmpValue::text("cisco WS-C2960X-48TS-L"),
            );
        if let Some(addr) = remote_address {
            device = device
                .set_column(&column(mib::CDP_CACHE_ADDRESS_TYPE), &row, SnmpValue::Integer(1))
                .set_column(
                    &column(mib::CDP_CACHE_ADDRESS),
                    &row,
                    SnmpValue::OctetString(addr.to_vec()),
                );
        }
        device
    }
}

/// `n` routers `10.0.0.1..=n` cabled in a ring over LLDP
///
/// Router `i` reaches the next one through `Gi0/1` and the previous one
/// through `Gi0/2`.
pub fn ring(n: u8) -> Vec<MockDevice> {
    let next = |i: u8| if i == n { 1 } else { i + 1 };
    let prev = |i: u8| if i == 1 { n } else { i - 1 };
    (1..=n)
        .map(|i| {
            MockDevice::new([10, 0, 0, i], &format!("r{}", i), "Cisco IOS XR router")
                .interface(1, "Gi0/1")
                .interface(2, "Gi0/2")
                .lldp_neighbor(1, 1, &format!("r{}", next(i)), "Gi0/2", Some([10, 0, 0, next(i)]))
                .lldp_neighbor(2, 2, &format!("r{}", prev(i)), "Gi0/1", Some([10, 0, 0, prev(i)]))
        })
        .collect()
}

/// In-memory `ProtocolPort`
///
/// Unknown addresses behave like silent hosts and time out. Failures can be
/// injected per address or per walked prefix.
#[derive(Debug, Default)]
pub struct MockPort {
    devices: Mutex<HashMap<IpAddr, VarBinds>>,
    address_failures: HashMap<IpAddr, ProtocolError>,
    prefix_failures: Vec<(IpAddr, ObjectId, ProtocolError)>,
    contacted: Mutex<HashSet<IpAddr>>,
    cancel_on_contact: Option<CancelHandle>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(self, devices: impl IntoIterator<Item = MockDevice>) -> Self {
        devices.into_iter().fold(self, |port, device| port.with_device(device))
    }

    pub fn with_device(self, device: MockDevice) -> Self {
        if let Ok(mut devices) = self.devices.lock() {
            devices.insert(device.address, device.values);
        }
        self
    }

    pub fn fail_address(mut self, address: IpAddr, error: ProtocolError) -> Self {
        self.address_failures.insert(address, error);
        self
    }

    pub fn fail_prefix(mut self, address: IpAddr, prefix: &[u32], error: ProtocolError) -> Self {
        self.prefix_failures.push((address, mib::oid(prefix), error));
        self
    }

    /// Raise `handle` when the first request arrives
    pub fn cancel_on_contact(mut self, handle: CancelHandle) -> Self {
        self.cancel_on_contact = Some(handle);
        self
    }

    /// Number of distinct addresses that saw a request
    pub fn contacted_count(&self) -> usize {
        self.contacted.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// True if any request was sent to `address`
    pub fn was_contacted(&self, address: IpAddr) -> bool {
        self.contacted
            .lock()
            .map(|c| c.contains(&address))
            .unwrap_or(false)
    }

    fn check(&self, address: IpAddr, oid: &ObjectId) -> ProtocolResult<()> {
        if let Ok(mut contacted) = self.contacted.lock() {
            contacted.insert(address);
        }
        if let Some(handle) = &self.cancel_on_contact {
            handle.cancel();
        }
        if let Some(error) = self.address_failures.get(&address) {
            return Err(error.clone());
        }
        for (failing, prefix, error) in &self.prefix_failures {
            if *failing == address && (oid.starts_with(prefix) || prefix.starts_with(oid)) {
                return Err(error.clone());
            }
        }
        let known = self
            .devices
            .lock()
            .map(|devices| devices.contains_key(&address))
            .unwrap_or(false);
        if known {
            Ok(())
        } else {
            Err(ProtocolError::Timeout)
        }
    }

    fn read(&self, address: IpAddr, oid: &ObjectId) -> Option<SnmpValue> {
        self.devices
            .lock()
            .ok()?
            .get(&address)
            .and_then(|tree| tree.get(oid).cloned())
    }
}

#[async_trait]
impl ProtocolPort for MockPort {
    async fn get(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        _credentials: &Credentials,
    ) -> ProtocolResult<Option<SnmpValue>> {
        self.check(address, oid)?;
        Ok(self.read(address, oid))
    }

    async fn get_bulk(
        &self,
        address: IpAddr,
        oids: &[ObjectId],
        _credentials: &Credentials,
    ) -> ProtocolResult<VarBinds> {
        let mut found = VarBinds::new();
        for oid in oids {
            self.check(address, oid)?;
            if let Some(value) = self.read(address, oid) {
                found.insert(oid.clone(), value);
            }
        }
        Ok(found)
    }

    async fn walk(
        &self,
        address: IpAddr,
        prefix: &ObjectId,
        _credentials: &Credentials,
    ) -> ProtocolResult<VarBinds> {
        self.check(address, prefix)?;
        let devices = self
            .devices
            .lock()
            .map_err(|_| ProtocolError::Other("mock poisoned".into()))?;
        Ok(devices
            .get(&address)
            .map(|tree| {
                tree.range(prefix.clone()..)
                    .take_while(|(oid, _)| oid.starts_with(prefix))
                    .map(|(oid, value)| (oid.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set(
        &self,
        address: IpAddr,
        oid: &ObjectId,
        value: SnmpValue,
        _credentials: &Credentials,
    ) -> ProtocolResult<()> {
        self.check(address, oid)?;
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| ProtocolError::Other("mock poisoned".into()))?;
        if let Some(tree) = devices.get_mut(&address) {
            tree.insert(oid.clone(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_walk_and_set() {
        let device = MockDevice::new([10, 0, 0, 1], "r1", "router").interface(1, "Gi0/1");
        let port = MockPort::new().with_device(device);
        let creds = Credentials::v2c("public");
        let addr = ip([10, 0, 0, 1]);

        let names = port.walk(addr, &mib::oid(mib::IF_NAME), &creds).await.unwrap();
        assert_eq!(names.len(), 1);

        let location = mib::oid(mib::SYS_LOCATION);
        assert_eq!(port.get(addr, &location, &creds).await.unwrap(), None);
        port.set(addr, &location, SnmpValue::text("lab"), &creds)
            .await
            .unwrap();
        assert_eq!(
            port.get(addr, &location, &creds).await.unwrap(),
            Some(SnmpValue::text("lab"))
        );

        let silent = ip([10, 0, 0, 9]);
        assert_eq!(
            port.get(silent, &location, &creds).await,
            Err(ProtocolError::Timeout)
        );
    }
}
