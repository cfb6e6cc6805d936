//! Topology graph over devices and their connections
//!
//! The graph is a read-only view built per query from an inventory snapshot:
//! nodes are devices with at least one interface taking part in a
//! connection, edges are connections projected onto device pairs. Parallel
//! links between the same two devices stay distinct edges, each carrying the
//! id of the connection it came from.
//!
//! Policies for the two ambiguous shapes:
//! - A self-loop (two interfaces of one device cabled together) is a real
//!   loop and is reported by `detect_cycles` as the one-edge cycle `[a, a]`.
//!   It never appears in a simple path.
//! - Parallel links are collapsed into one hop by `paths`, so every device
//!   sequence is listed once. `link_paths` expands each sequence into one
//!   entry per combination of parallel links. For cycle detection every
//!   redundant parallel link closes a two-device cycle `[a, b, a]`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::connection::{Connection, ConnectionId};
use crate::device::DeviceId;
use crate::inventory::InventorySnapshot;

/// Ordered device ids; cycles repeat their first device at the end
pub type Path = Vec<DeviceId>;

/// A simple path with the concrete connection used for every hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPath {
    pub devices: Path,
    pub links: Vec<ConnectionId>,
}

/// Adjacency-list view of the topology
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    /// For every device, its (neighbor, connection) pairs in insertion order
    adjacency: BTreeMap<DeviceId, Vec<(DeviceId, ConnectionId)>>,
    edge_count: usize,
}

impl TopologyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from connections alone
    pub fn from_connections<'a>(connections: impl IntoIterator<Item = &'a Connection>) -> Self {
        let mut graph = Self::new();
        for connection in connections {
            graph.add_edge(connection.id, connection.local.device, connection.remote.device);
        }
        graph
    }

    /// Build from an inventory snapshot
    ///
    /// Connections referring to devices missing from the snapshot are skipped.
    pub fn from_snapshot(snapshot: &InventorySnapshot) -> Self {
        let known: HashSet<DeviceId> = snapshot.devices.iter().map(|d| d.id).collect();
        Self::from_connections(snapshot.connections.iter().filter(|c| {
            known.contains(&c.local.device) && known.contains(&c.remote.device)
        }))
    }

    /// Add an undirected edge; a self-loop is stored once
    pub fn add_edge(&mut self, id: ConnectionId, a: DeviceId, b: DeviceId) {
        self.adjacency.entry(a).or_default().push((b, id));
        if a != b {
            self.adjacency.entry(b).or_default().push((a, id));
        }
        self.edge_count += 1;
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.adjacency.contains_key(device)
    }

    /// All devices in the graph
    pub fn nodes(&self) -> impl Iterator<Item = &DeviceId> {
        self.adjacency.keys()
    }

    /// Distinct neighboring devices, excluding the device itself
    pub fn neighbors(&self, device: &DeviceId) -> Vec<DeviceId> {
        let mut seen = HashSet::new();
        self.adjacency
            .get(device)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(next, _)| next != device && seen.insert(*next))
                    .map(|(next, _)| *next)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections joining two devices, in insertion order
    pub fn links_between(&self, a: &DeviceId, b: &DeviceId) -> Vec<ConnectionId> {
        self.adjacency
            .get(a)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(next, _)| next == b)
                    .map(|(_, id)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connected components, each listing its devices
    pub fn components(&self) -> Vec<Vec<DeviceId>> {
        let mut visited = HashSet::new();
        let mut components = Vec::new();

        for start in self.adjacency.keys() {
            if !visited.insert(*start) {
                continue;
            }
            let mut component = vec![*start];
            let mut stack = vec![*start];
            while let Some(node) = stack.pop() {
                for next in self.neighbors(&node) {
                    if visited.insert(next) {
                        component.push(next);
                        stack.push(next);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Every simple path from `source` to `target`
    ///
    /// Exhaustive depth-first enumeration; no shortest-path ordering is
    /// applied. Returns an empty list when the devices are disconnected,
    /// unknown, or identical.
    pub fn paths(&self, source: &DeviceId, target: &DeviceId) -> Vec<Path> {
        let mut found = Vec::new();
        if source == target || !self.contains(source) || !self.contains(target) {
            return found;
        }
        let on_path = HashSet::from([*source]);
        self.collect_paths(source, target, on_path, vec![*source], &mut found);
        found
    }

    /// Each branch gets its own copy of the on-path set so siblings never
    /// see each other's visits.
    fn collect_paths(
        &self,
        current: &DeviceId,
        target: &DeviceId,
        on_path: HashSet<DeviceId>,
        path: Path,
        found: &mut Vec<Path>,
    ) {
        for next in self.neighbors(current) {
            if on_path.contains(&next) {
                continue;
            }
            let mut branch = path.clone();
            branch.push(next);
            if &next == target {
                found.push(branch);
                continue;
            }
            let mut branch_on_path = on_path.clone();
            branch_on_path.insert(next);
            self.collect_paths(&next, target, branch_on_path, branch, found);
        }
    }

    /// Every simple path expanded over parallel links
    pub fn link_paths(&self, source: &DeviceId, target: &DeviceId) -> Vec<LinkPath> {
        let mut expanded = Vec::new();
        for devices in self.paths(source, target) {
            let mut partial: Vec<Vec<ConnectionId>> = vec![Vec::new()];
            for hop in devices.windows(2) {
                let links = self.links_between(&hop[0], &hop[1]);
                partial = partial
                    .into_iter()
                    .flat_map(|prefix| {
                        links.iter().map(move |link| {
                            let mut next = prefix.clone();
                            next.push(*link);
                            next
                        })
                    })
                    .collect();
            }
            expanded.extend(partial.into_iter().map(|links| LinkPath {
                devices: devices.clone(),
                links,
            }));
        }
        expanded
    }

    /// Cycles found by depth-first search over every component
    ///
    /// One cycle is reported per back edge, so the count equals the number
    /// of independent loops (edges − nodes + components). Each cycle runs
    /// from the revisited device down the current branch and back to it.
    pub fn detect_cycles(&self) -> Vec<Path> {
        let mut visited = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.adjacency.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut search = CycleSearch {
                graph: self,
                visited: &mut visited,
                path: Vec::new(),
                on_path: HashSet::new(),
                cycles: &mut cycles,
            };
            search.visit(*start, None);
        }
        cycles
    }
}

/// State for one cycle-detection DFS
///
/// `visited` is monotonic across the whole graph; `path` and `on_path` track
/// only the current branch and are unwound on backtrack.
struct CycleSearch<'a> {
    graph: &'a TopologyGraph,
    visited: &'a mut HashSet<DeviceId>,
    path: Vec<DeviceId>,
    on_path: HashSet<DeviceId>,
    cycles: &'a mut Vec<Path>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: DeviceId, arrived_by: Option<ConnectionId>) {
        self.visited.insert(node);
        self.path.push(node);
        self.on_path.insert(node);

        let graph = self.graph;
        if let Some(edges) = graph.adjacency.get(&node) {
            for (next, link) in edges {
                // The edge we came in on is not a loop
                if Some(*link) == arrived_by {
                    continue;
                }
                if self.on_path.contains(next) {
                    if let Some(start) = self.path.iter().position(|d| d == next) {
                        let mut cycle = self.path[start..].to_vec();
                        cycle.push(*next);
                        self.cycles.push(cycle);
                    }
                } else if !self.visited.contains(next) {
                    self.visit(*next, Some(*link));
                }
            }
        }

        self.path.pop();
        self.on_path.remove(&node);
    }
}
