//! Inventory storage port and the bundled in-memory store
//!
//! Discovery writes through [`PersistencePort`]; the graph and query side
//! read an [`InventorySnapshot`]. [`MemoryInventory`] is the default
//! implementation and can be saved to and loaded from a JSON file between
//! runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::{endpoint_key, Connection, ConnectionId, Endpoint};
use crate::device::{Device, DeviceId};
use crate::interface::{Interface, InterfaceId};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl PersistenceError {
    pub fn device(id: DeviceId) -> Self {
        PersistenceError::NotFound {
            kind: "device",
            id: id.to_string(),
        }
    }

    pub fn interface(id: InterfaceId) -> Self {
        PersistenceError::NotFound {
            kind: "interface",
            id: id.to_string(),
        }
    }

    fn connection(id: ConnectionId) -> Self {
        PersistenceError::NotFound {
            kind: "connection",
            id: id.to_string(),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Point-in-time copy of the whole inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub connections: Vec<Connection>,
}

impl InventorySnapshot {
    /// Load a snapshot from a JSON file
    pub fn from_file(path: &Path) -> PersistenceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PersistenceResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn device_by_address(&self, address: IpAddr) -> Option<&Device> {
        self.devices.iter().find(|d| d.management_address == address)
    }
}

/// CRUD access to devices, interfaces and connections
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn get_device(&self, id: DeviceId) -> PersistenceResult<Option<Device>>;
    async fn find_device_by_address(&self, address: IpAddr) -> PersistenceResult<Option<Device>>;
    /// Fails with `Conflict` if the management address is already taken
    async fn insert_device(&self, device: Device) -> PersistenceResult<()>;
    async fn update_device(&self, device: Device) -> PersistenceResult<()>;
    async fn list_devices(&self) -> PersistenceResult<Vec<Device>>;

    async fn get_interface(&self, id: InterfaceId) -> PersistenceResult<Option<Interface>>;
    async fn find_interface_by_index(
        &self,
        device: DeviceId,
        index: u32,
    ) -> PersistenceResult<Option<Interface>>;
    async fn find_interface_by_name(
        &self,
        device: DeviceId,
        name: &str,
    ) -> PersistenceResult<Option<Interface>>;
    /// Interfaces of one device in insertion order
    async fn list_interfaces(&self, device: DeviceId) -> PersistenceResult<Vec<Interface>>;
    /// Also appends the interface to its owning device
    async fn insert_interface(&self, interface: Interface) -> PersistenceResult<()>;
    async fn update_interface(&self, interface: Interface) -> PersistenceResult<()>;

    /// Connection joining two endpoints in either direction
    async fn find_connection(
        &self,
        a: Endpoint,
        b: Endpoint,
    ) -> PersistenceResult<Option<Connection>>;
    async fn insert_connection(&self, connection: Connection) -> PersistenceResult<()>;
    async fn update_connection(&self, connection: Connection) -> PersistenceResult<()>;
    async fn list_connections(&self) -> PersistenceResult<Vec<Connection>>;

    async fn snapshot(&self) -> PersistenceResult<InventorySnapshot>;
}

#[derive(Debug, Default)]
struct Store {
    devices: Vec<Device>,
    interfaces: Vec<Interface>,
    connections: Vec<Connection>,
    device_by_id: HashMap<DeviceId, usize>,
    device_by_address: HashMap<IpAddr, DeviceId>,
    interface_by_id: HashMap<InterfaceId, usize>,
    connection_by_id: HashMap<ConnectionId, usize>,
    connection_by_key: HashMap<(Endpoint, Endpoint), ConnectionId>,
}

impl Store {
    fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let mut store = Store::default();
        for device in snapshot.devices {
            store.push_device(device);
        }
        for interface in snapshot.interfaces {
            store.push_interface(interface);
        }
        for connection in snapshot.connections {
            store.push_connection(connection);
        }
        store
    }

    fn push_device(&mut self, device: Device) {
        self.device_by_id.insert(device.id, self.devices.len());
        self.device_by_address.insert(device.management_address, device.id);
        self.devices.push(device);
    }

    fn push_interface(&mut self, interface: Interface) {
        self.interface_by_id.insert(interface.id, self.interfaces.len());
        self.interfaces.push(interface);
    }

    fn push_connection(&mut self, connection: Connection) {
        self.connection_by_id.insert(connection.id, self.connections.len());
        self.connection_by_key.insert(connection.endpoint_key(), connection.id);
        self.connections.push(connection);
    }

    fn device_mut(&mut self, id: DeviceId) -> PersistenceResult<&mut Device> {
        let slot = *self
            .device_by_id
            .get(&id)
            .ok_or_else(|| PersistenceError::device(id))?;
        Ok(&mut self.devices[slot])
    }

    fn interfaces_of(&self, device: DeviceId) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter().filter(move |i| i.device_id == device)
    }

    fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            devices: self.devices.clone(),
            interfaces: self.interfaces.clone(),
            connections: self.connections.clone(),
        }
    }
}

/// In-memory inventory with optional JSON file backing
#[derive(Debug, Default)]
pub struct MemoryInventory {
    store: RwLock<Store>,
}

impl MemoryInventory {
    /// Create a new empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        Self {
            store: RwLock::new(Store::from_snapshot(snapshot)),
        }
    }

    /// Load inventory from a file or start empty if it doesn't exist
    pub fn load_or_create(path: &Path) -> PersistenceResult<Self> {
        if path.exists() {
            let snapshot = InventorySnapshot::from_file(path)?;
            debug!(
                "Loaded inventory from {:?}: {} devices, {} connections",
                path,
                snapshot.devices.len(),
                snapshot.connections.len()
            );
            Ok(Self::from_snapshot(snapshot))
        } else {
            Ok(Self::new())
        }
    }

    /// Write the current contents to a JSON file
    pub async fn save(&self, path: &Path) -> PersistenceResult<()> {
        let snapshot = self.store.read().await.snapshot();
        snapshot.save(path)
    }
}

#[async_trait]
impl PersistencePort for MemoryInventory {
    async fn get_device(&self, id: DeviceId) -> PersistenceResult<Option<Device>> {
        let store = self.store.read().await;
        Ok(store.device_by_id.get(&id).map(|&i| store.devices[i].clone()))
    }

    async fn find_device_by_address(&self, address: IpAddr) -> PersistenceResult<Option<Device>> {
        let store = self.store.read().await;
        Ok(store
            .device_by_address
            .get(&address)
            .and_then(|id| store.device_by_id.get(id))
            .map(|&i| store.devices[i].clone()))
    }

    async fn insert_device(&self, device: Device) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        if store.device_by_address.contains_key(&device.management_address) {
            return Err(PersistenceError::Conflict(format!(
                "management address {} already in use",
                device.management_address
            )));
        }
        if store.device_by_id.contains_key(&device.id) {
            return Err(PersistenceError::Conflict(format!("device {} exists", device.id)));
        }
        store.push_device(device);
        Ok(())
    }

    async fn update_device(&self, device: Device) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        let old_address = store.device_mut(device.id)?.management_address;
        if old_address != device.management_address {
            if store.device_by_address.contains_key(&device.management_address) {
                return Err(PersistenceError::Conflict(format!(
                    "management address {} already in use",
                    device.management_address
                )));
            }
            store.device_by_address.remove(&old_address);
            store
                .device_by_address
                .insert(device.management_address, device.id);
        }
        let id = device.id;
        *store.device_mut(id)? = device;
        Ok(())
    }

    async fn list_devices(&self) -> PersistenceResult<Vec<Device>> {
        Ok(self.store.read().await.devices.clone())
    }

    async fn get_interface(&self, id: InterfaceId) -> PersistenceResult<Option<Interface>> {
        let store = self.store.read().await;
        Ok(store
            .interface_by_id
            .get(&id)
            .map(|&i| store.interfaces[i].clone()))
    }

    async fn find_interface_by_index(
        &self,
        device: DeviceId,
        index: u32,
    ) -> PersistenceResult<Option<Interface>> {
        let store = self.store.read().await;
        let found = store
            .interfaces_of(device)
            .find(|i| i.index == Some(index))
            .cloned();
        Ok(found)
    }

    async fn find_interface_by_name(
        &self,
        device: DeviceId,
        name: &str,
    ) -> PersistenceResult<Option<Interface>> {
        let store = self.store.read().await;
        let found = store.interfaces_of(device).find(|i| i.name == name).cloned();
        Ok(found)
    }

    async fn list_interfaces(&self, device: DeviceId) -> PersistenceResult<Vec<Interface>> {
        let store = self.store.read().await;
        let interfaces = store.interfaces_of(device).cloned().collect();
        Ok(interfaces)
    }

    async fn insert_interface(&self, interface: Interface) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        if store.interface_by_id.contains_key(&interface.id) {
            return Err(PersistenceError::Conflict(format!(
                "interface {} exists",
                interface.id
            )));
        }
        if let Some(index) = interface.index {
            if store
                .interfaces_of(interface.device_id)
                .any(|i| i.index == Some(index))
            {
                return Err(PersistenceError::Conflict(format!(
                    "interface index {} already present on device {}",
                    index, interface.device_id
                )));
            }
        }
        if store
            .interfaces_of(interface.device_id)
            .any(|i| i.name == interface.name)
        {
            return Err(PersistenceError::Conflict(format!(
                "interface {} already present on device {}",
                interface.name, interface.device_id
            )));
        }
        store.device_mut(interface.device_id)?.interfaces.push(interface.id);
        store.push_interface(interface);
        Ok(())
    }

    async fn update_interface(&self, interface: Interface) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        let slot = *store
            .interface_by_id
            .get(&interface.id)
            .ok_or_else(|| PersistenceError::interface(interface.id))?;
        store.interfaces[slot] = interface;
        Ok(())
    }

    async fn find_connection(
        &self,
        a: Endpoint,
        b: Endpoint,
    ) -> PersistenceResult<Option<Connection>> {
        let store = self.store.read().await;
        Ok(store
            .connection_by_key
            .get(&endpoint_key(&a, &b))
            .and_then(|id| store.connection_by_id.get(id))
            .map(|&i| store.connections[i].clone()))
    }

    async fn insert_connection(&self, connection: Connection) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        if store.connection_by_key.contains_key(&connection.endpoint_key()) {
            return Err(PersistenceError::Conflict(format!(
                "connection between {:?} and {:?} exists",
                connection.local, connection.remote
            )));
        }
        for endpoint in [connection.local, connection.remote] {
            if !store.device_by_id.contains_key(&endpoint.device) {
                return Err(PersistenceError::device(endpoint.device));
            }
            if !store.interface_by_id.contains_key(&endpoint.interface) {
                return Err(PersistenceError::interface(endpoint.interface));
            }
        }
        store.push_connection(connection);
        Ok(())
    }

    async fn update_connection(&self, connection: Connection) -> PersistenceResult<()> {
        let mut store = self.store.write().await;
        let slot = *store
            .connection_by_id
            .get(&connection.id)
            .ok_or_else(|| PersistenceError::connection(connection.id))?;
        if store.connections[slot].endpoint_key() != connection.endpoint_key() {
            return Err(PersistenceError::Conflict(format!(
                "connection {} endpoints cannot change",
                connection.id
            )));
        }
        store.connections[slot] = connection;
        Ok(())
    }

    async fn list_connections(&self) -> PersistenceResult<Vec<Connection>> {
        Ok(self.store.read().await.connections.clone())
    }

    async fn snapshot(&self) -> PersistenceResult<InventorySnapshot> {
        Ok(self.store.read().await.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionKind, NeighborProtocol};
    use crate::interface::InterfaceRecord;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn record(index: u32, name: &str) -> InterfaceRecord {
        InterfaceRecord {
            index,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_device_address_is_unique() {
        let inventory = MemoryInventory::new();
        inventory
            .insert_device(Device::new("r1".into(), addr(1)))
            .await
            .unwrap();
        let err = inventory
            .insert_device(Device::new("r1-again".into(), addr(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));

        let found = inventory.find_device_by_address(addr(1)).await.unwrap();
        assert_eq!(found.map(|d| d.name), Some("r1".to_string()));
        assert!(inventory.find_device_by_address(addr(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_device() {
        let inventory = MemoryInventory::new();
        let err = inventory
            .update_device(Device::new("ghost".into(), addr(9)))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound { kind: "device", .. }));
    }

    #[tokio::test]
    async fn test_interfaces_keep_insertion_order() {
        let inventory = MemoryInventory::new();
        let device = Device::new("sw1".into(), addr(1));
        let device_id = device.id;
        inventory.insert_device(device).await.unwrap();

        for (index, name) in [(3, "Gi0/3"), (1, "Gi0/1"), (2, "Gi0/2")] {
            inventory
                .insert_interface(Interface::from_record(device_id, &record(index, name)))
                .await
                .unwrap();
        }

        let names: Vec<_> = inventory
            .list_interfaces(device_id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Gi0/3", "Gi0/1", "Gi0/2"]);

        let stored = inventory.get_device(device_id).await.unwrap().unwrap();
        assert_eq!(stored.interfaces.len(), 3);

        let by_index = inventory.find_interface_by_index(device_id, 1).await.unwrap();
        assert_eq!(by_index.map(|i| i.name), Some("Gi0/1".to_string()));
        let by_name = inventory.find_interface_by_name(device_id, "Gi0/2").await.unwrap();
        assert_eq!(by_name.and_then(|i| i.index), Some(2));

        let dup = inventory
            .insert_interface(Interface::from_record(device_id, &record(1, "dup")))
            .await
            .unwrap_err();
        assert!(matches!(dup, PersistenceError::Conflict(_)));

        let same_name = inventory
            .insert_interface(Interface::from_record(device_id, &record(9, "Gi0/3")))
            .await
            .unwrap_err();
        assert!(matches!(same_name, PersistenceError::Conflict(_)));
        let placeholder = inventory
            .insert_interface(Interface::placeholder(device_id, "Gi0/1"))
            .await
            .unwrap_err();
        assert!(matches!(placeholder, PersistenceError::Conflict(_)));
        assert_eq!(inventory.list_interfaces(device_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_device_moves_address_index() {
        let inventory = MemoryInventory::new();
        let mut device = Device::new("r1".into(), addr(1));
        inventory.insert_device(device.clone()).await.unwrap();

        device.management_address = addr(5);
        inventory.update_device(device.clone()).await.unwrap();
        assert!(inventory.find_device_by_address(addr(1)).await.unwrap().is_none());
        let moved = inventory.find_device_by_address(addr(5)).await.unwrap();
        assert_eq!(moved.map(|d| d.id), Some(device.id));
    }

    #[tokio::test]
    async fn test_connection_lookup_is_unordered() {
        let inventory = MemoryInventory::new();
        let a = Device::new("a".into(), addr(1));
        let b = Device::new("b".into(), addr(2));
        let (a_id, b_id) = (a.id, b.id);
        inventory.insert_device(a).await.unwrap();
        inventory.insert_device(b).await.unwrap();
        let ia = Interface::from_record(a_id, &record(1, "Gi0/1"));
        let ib = Interface::from_record(b_id, &record(1, "Gi0/1"));
        let left = Endpoint { device: a_id, interface: ia.id };
        let right = Endpoint { device: b_id, interface: ib.id };
        inventory.insert_interface(ia).await.unwrap();
        inventory.insert_interface(ib).await.unwrap();

        let conn = Connection::new(left, right, NeighborProtocol::Lldp, ConnectionKind::Physical);
        inventory.insert_connection(conn.clone()).await.unwrap();

        let found = inventory.find_connection(right, left).await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(conn.id));

        let reversed =
            Connection::new(right, left, NeighborProtocol::Cdp, ConnectionKind::Physical);
        assert!(matches!(
            inventory.insert_connection(reversed).await,
            Err(PersistenceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("inventory.json");

        let inventory = MemoryInventory::load_or_create(&path).unwrap();
        assert!(inventory.list_devices().await.unwrap().is_empty());

        let device = Device::new("r1".into(), addr(1));
        let device_id = device.id;
        inventory.insert_device(device).await.unwrap();
        inventory
            .insert_interface(Interface::from_record(device_id, &record(1, "Gi0/1")))
            .await
            .unwrap();
        inventory.save(&path).await.unwrap();

        let reloaded = MemoryInventory::load_or_create(&path).unwrap();
        let snapshot = reloaded.snapshot().await.unwrap();
        assert_eq!(snapshot.devices.len(), 1);
        assert_eq!(snapshot.interfaces.len(), 1);
        assert!(reloaded.find_device_by_address(addr(1)).await.unwrap().is_some());
        assert!(reloaded
            .find_interface_by_index(device_id, 1)
            .await
            .unwrap()
            .is_some());
    }
}
