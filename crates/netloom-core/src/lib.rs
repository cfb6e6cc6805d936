//! Netloom Core - Inventory types, persistence port, and topology graph
//!
//! This crate provides the foundational types for the netloom system:
//! - Device, interface and connection records kept in the inventory
//! - Neighbor adjacencies and per-address discovery results
//! - The persistence port plus an in-memory, JSON-file-backed inventory
//! - Topology graph with path enumeration and cycle detection

pub mod connection;
pub mod device;
pub mod discovery;
pub mod graph;
pub mod interface;
pub mod inventory;
pub mod neighbor;

pub use connection::{Connection, ConnectionId, ConnectionKind, Endpoint, NeighborProtocol};
pub use device::{Device, DeviceId, DeviceIdentity, DeviceStatus, DeviceType};
pub use discovery::{DiscoveryResult, DiscoveryStep, StepFailure};
pub use graph::{LinkPath, Path, TopologyGraph};
pub use interface::{Interface, InterfaceId, InterfaceRecord, InterfaceStatus, InterfaceType};
pub use inventory::{
    InventorySnapshot, MemoryInventory, PersistenceError, PersistencePort, PersistenceResult,
};
pub use neighbor::{normalize_port_name, system_name, Neighbor};
