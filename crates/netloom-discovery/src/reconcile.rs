//! Reconciliation of discovery results into the inventory
//!
//! Devices are matched by management address, interfaces by index and then
//! by name, connections by their unordered endpoint pair. Writes for one
//! address are serialized through a per-address lock so two concurrent
//! discoveries of the same device cannot lose each other's updates.

use chrono::Utc;
use netloom_core::{
    normalize_port_name, system_name, Connection, ConnectionKind, Device, DeviceStatus,
    DiscoveryResult, Endpoint, Interface, InterfaceId, InventorySnapshot, Neighbor,
    PersistenceError, PersistencePort, PersistenceResult,
};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

/// What one merge wrote
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub device: Device,
    /// Interfaces backing the discovered table rows, in table order
    pub interfaces: Vec<Interface>,
    /// Connections created or refreshed from the neighbor list
    pub connections: Vec<Connection>,
}

pub struct ReconciliationMerger {
    store: Arc<dyn PersistencePort>,
    locks: Mutex<HashMap<IpAddr, Arc<Mutex<()>>>>,
    /// Serializes the find-then-insert of connections reported from both ends
    connections: Mutex<()>,
}

impl ReconciliationMerger {
    pub fn new(store: Arc<dyn PersistencePort>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            connections: Mutex::new(()),
        }
    }

    /// Merge one result: device and interfaces, then its connections
    pub async fn merge(&self, result: &DiscoveryResult) -> PersistenceResult<MergeOutcome> {
        let (device, interfaces) = self.upsert_device(result).await?;
        let connections = self.link(result, &device, &interfaces).await?;
        let device = self.refreshed(device).await?;
        Ok(MergeOutcome {
            device,
            interfaces,
            connections,
        })
    }

    /// Merge a batch in two phases
    ///
    /// Every device and interface is written before any connection, so a
    /// neighbor's device is found regardless of result order. A failing
    /// address is reported and the rest of the batch continues.
    pub async fn merge_batch(
        &self,
        results: &[DiscoveryResult],
    ) -> (Vec<MergeOutcome>, Vec<(IpAddr, PersistenceError)>) {
        let mut failures = Vec::new();
        let mut upserted = Vec::new();
        for result in results {
            match self.upsert_device(result).await {
                Ok((device, interfaces)) => upserted.push((result, device, interfaces)),
                Err(e) => {
                    debug!(address = %result.address, error = %e, "Device merge failed");
                    failures.push((result.address, e));
                }
            }
        }

        let mut outcomes = Vec::with_capacity(upserted.len());
        for (result, device, interfaces) in upserted {
            let linked = match self.link(result, &device, &interfaces).await {
                Ok(connections) => self.refreshed(device).await.map(|device| MergeOutcome {
                    device,
                    interfaces,
                    connections,
                }),
                Err(e) => Err(e),
            };
            match linked {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    debug!(address = %result.address, error = %e, "Connection merge failed");
                    failures.push((result.address, e));
                }
            }
        }

        info!(
            merged = outcomes.len(),
            failed = failures.len(),
            "Batch merge complete"
        );
        (outcomes, failures)
    }

    async fn address_lock(&self, address: IpAddr) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(address).or_default().clone()
    }

    /// Drop the address's lock entry once no other merge holds or awaits it
    async fn release_lock(&self, address: IpAddr, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks
            .get(&address)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&address);
        }
    }

    async fn refreshed(&self, device: Device) -> PersistenceResult<Device> {
        self.store
            .get_device(device.id)
            .await?
            .ok_or_else(|| PersistenceError::device(device.id))
    }

    async fn upsert_device(
        &self,
        result: &DiscoveryResult,
    ) -> PersistenceResult<(Device, Vec<Interface>)> {
        let lock = self.address_lock(result.address).await;
        let upserted = {
            let _guard = lock.lock().await;
            self.upsert_device_locked(result).await
        };
        self.release_lock(result.address, lock).await;
        upserted
    }

    async fn upsert_device_locked(
        &self,
        result: &DiscoveryResult,
    ) -> PersistenceResult<(Device, Vec<Interface>)> {
        let status = if result.is_partial() {
            DeviceStatus::Degraded
        } else {
            DeviceStatus::Online
        };

        let device = match self.store.find_device_by_address(result.address).await? {
            Some(mut device) => {
                device.apply_identity(&result.identity);
                device.status = status;
                device.touch();
                self.store.update_device(device.clone()).await?;
                debug!(address = %result.address, id = %device.id, "Updated device");
                device
            }
            None => {
                let mut device = Device::from_identity(result.address, &result.identity);
                device.status = status;
                self.store.insert_device(device.clone()).await?;
                info!(address = %result.address, name = %device.name, "New device");
                device
            }
        };

        let interfaces = self.upsert_interfaces(&device, result).await?;
        Ok((device, interfaces))
    }

    /// Caller holds the device's address lock
    async fn upsert_interfaces(
        &self,
        device: &Device,
        result: &DiscoveryResult,
    ) -> PersistenceResult<Vec<Interface>> {
        let existing = self.store.list_interfaces(device.id).await?;
        let reported: HashSet<u32> = result.interfaces.iter().map(|r| r.index).collect();
        let mut claimed: HashSet<InterfaceId> = HashSet::new();
        let mut merged = Vec::with_capacity(result.interfaces.len());

        for record in &result.interfaces {
            let unclaimed = |i: &&Interface| !claimed.contains(&i.id);
            // An index seen on another row this run belongs to that row
            let renamed_from = |i: &&Interface| match i.index {
                None => true,
                Some(index) => !reported.contains(&index),
            };
            let normalized = normalize_port_name(&record.name);

            let matched = existing
                .iter()
                .filter(unclaimed)
                .find(|i| i.index == Some(record.index))
                .or_else(|| {
                    existing
                        .iter()
                        .filter(unclaimed)
                        .filter(renamed_from)
                        .find(|i| i.name == record.name)
                })
                .or_else(|| {
                    existing
                        .iter()
                        .filter(unclaimed)
                        .filter(|i| i.index.is_none())
                        .find(|i| normalize_port_name(&i.name) == normalized)
                });

            match matched {
                Some(current) => {
                    let mut interface = current.clone();
                    interface.apply_record(record);
                    claimed.insert(interface.id);
                    merged.push(Some(interface));
                }
                None => merged.push(None),
            }
        }

        // Renames land before inserts so a freed name can be taken again
        for interface in merged.iter().flatten() {
            self.store.update_interface(interface.clone()).await?;
        }
        let mut interfaces = Vec::with_capacity(merged.len());
        for (record, matched) in result.interfaces.iter().zip(merged) {
            let interface = match matched {
                Some(interface) => interface,
                None => {
                    let interface = Interface::from_record(device.id, record);
                    self.store.insert_interface(interface.clone()).await?;
                    trace!(device = %device.id, index = record.index, name = %record.name, "New interface");
                    interface
                }
            };
            interfaces.push(interface);
        }
        Ok(interfaces)
    }

    /// Turn the neighbor list into connections
    ///
    /// Neighbors whose local port or remote device cannot be resolved yet
    /// are skipped; the connection appears once both ends are known.
    async fn link(
        &self,
        result: &DiscoveryResult,
        device: &Device,
        interfaces: &[Interface],
    ) -> PersistenceResult<Vec<Connection>> {
        let mut snapshot: Option<InventorySnapshot> = None;
        let mut connections: Vec<Connection> = Vec::new();

        for neighbor in &result.neighbors {
            let Some(local) = local_interface(neighbor, interfaces) else {
                debug!(address = %result.address, neighbor = ?neighbor.remote_name, "Local port of neighbor not resolved");
                continue;
            };
            let Some(remote) = self.remote_device(neighbor, &mut snapshot).await? else {
                trace!(address = %result.address, neighbor = ?neighbor.remote_name, "Neighbor not in inventory yet");
                continue;
            };
            let Some(remote_interface) = self.remote_interface(&remote, neighbor).await? else {
                continue;
            };

            let kind = if local.if_type.is_logical() || remote_interface.if_type.is_logical() {
                ConnectionKind::Logical
            } else {
                ConnectionKind::Physical
            };
            let local_end = Endpoint {
                device: device.id,
                interface: local.id,
            };
            let remote_end = Endpoint {
                device: remote.id,
                interface: remote_interface.id,
            };

            let connection = self
                .upsert_connection(local_end, remote_end, neighbor, kind)
                .await?;
            match connections.iter_mut().find(|c| c.id == connection.id) {
                Some(slot) => *slot = connection,
                None => connections.push(connection),
            }
        }
        Ok(connections)
    }

    async fn remote_device(
        &self,
        neighbor: &Neighbor,
        snapshot: &mut Option<InventorySnapshot>,
    ) -> PersistenceResult<Option<Device>> {
        if let Some(address) = neighbor.remote_address {
            if let Some(device) = self.store.find_device_by_address(address).await? {
                return Ok(Some(device));
            }
        }

        if snapshot.is_none() {
            *snapshot = Some(self.store.snapshot().await?);
        }
        let Some(snapshot) = snapshot.as_ref() else {
            return Ok(None);
        };

        // Advertised address may be a secondary interface address
        if let Some(address) = neighbor.remote_address {
            let owner = snapshot
                .interfaces
                .iter()
                .find(|i| i.ip == Some(address))
                .and_then(|i| snapshot.device(&i.device_id));
            if let Some(device) = owner {
                return Ok(Some(device.clone()));
            }
        }

        let Some(name) = neighbor.remote_name.as_deref().map(system_name) else {
            return Ok(None);
        };
        if name.is_empty() {
            return Ok(None);
        }
        Ok(snapshot
            .devices
            .iter()
            .find(|d| system_name(&d.name) == name)
            .cloned())
    }

    /// Find the remote port, creating an index-less placeholder if needed
    async fn remote_interface(
        &self,
        remote: &Device,
        neighbor: &Neighbor,
    ) -> PersistenceResult<Option<Interface>> {
        let candidates: Vec<String> = [&neighbor.remote_port, &neighbor.remote_port_description]
            .into_iter()
            .flatten()
            .map(|name| normalize_port_name(name))
            .filter(|name| !name.is_empty())
            .collect();
        let Some(port) = neighbor.remote_port.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };

        let lock = self.address_lock(remote.management_address).await;
        let found = {
            let _guard = lock.lock().await;
            self.find_or_place_interface(remote, &candidates, port).await
        };
        self.release_lock(remote.management_address, lock).await;
        found.map(Some)
    }

    /// Caller holds the remote device's address lock
    async fn find_or_place_interface(
        &self,
        remote: &Device,
        candidates: &[String],
        port: &str,
    ) -> PersistenceResult<Interface> {
        let existing = self.store.list_interfaces(remote.id).await?;
        for candidate in candidates {
            if let Some(interface) = existing
                .iter()
                .find(|i| normalize_port_name(&i.name) == *candidate)
            {
                return Ok(interface.clone());
            }
        }

        let placeholder = Interface::placeholder(remote.id, port.trim());
        self.store.insert_interface(placeholder.clone()).await?;
        debug!(device = %remote.id, port = %port, "Created placeholder interface");
        Ok(placeholder)
    }

    async fn upsert_connection(
        &self,
        local: Endpoint,
        remote: Endpoint,
        neighbor: &Neighbor,
        kind: ConnectionKind,
    ) -> PersistenceResult<Connection> {
        let _guard = self.connections.lock().await;
        match self.store.find_connection(local, remote).await? {
            Some(mut connection) => {
                if connection.upgrade_protocol(neighbor.protocol) {
                    debug!(id = %connection.id, protocol = %connection.protocol, "Connection protocol upgraded");
                }
                if kind == ConnectionKind::Logical {
                    connection.kind = kind;
                }
                connection.last_seen = Utc::now();
                self.store.update_connection(connection.clone()).await?;
                Ok(connection)
            }
            None => {
                let connection = Connection::new(local, remote, neighbor.protocol, kind);
                self.store.insert_connection(connection.clone()).await?;
                info!(id = %connection.id, protocol = %connection.protocol, "New connection");
                Ok(connection)
            }
        }
    }
}

/// Local interface a neighbor was heard on, by ifIndex then by name
fn local_interface<'a>(neighbor: &Neighbor, interfaces: &'a [Interface]) -> Option<&'a Interface> {
    if let Some(index) = neighbor.local_if_index {
        if let Some(interface) = interfaces.iter().find(|i| i.index == Some(index)) {
            return Some(interface);
        }
    }
    let name = normalize_port_name(neighbor.local_interface.as_deref()?);
    interfaces
        .iter()
        .find(|i| normalize_port_name(&i.name) == name)
}
