//! The dependency graph between artifact builds.

use kiln_build::{Builder, StopHandle};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A builder handle shared between a project and its callers.
pub type SharedBuilder = Arc<Mutex<dyn Builder>>;

/// Identity of a builder handle, taken from its allocation rather than its
/// contents. Two clones of one `Arc` share a `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The identity of `builder`.
    pub fn of(builder: &SharedBuilder) -> Self {
        Self(Arc::as_ptr(builder) as *const () as usize)
    }
}

pub(crate) fn lock(builder: &SharedBuilder) -> MutexGuard<'_, dyn Builder + 'static> {
    builder.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Node {
    builder: SharedBuilder,
    name: String,
    stop: StopHandle,
}

/// Builders and the "builds after" relation between them.
///
/// Edges run from a dependency to its dependents. Node iteration follows
/// insertion order, so build orders are deterministic.
#[derive(Default)]
pub struct BuildGraph {
    graph: DiGraphMap<NodeId, ()>,
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl BuildGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder`. Returns `false` if it was already registered.
    ///
    /// The builder's name and stop handle are captured here, so this briefly
    /// locks the builder.
    pub fn add(&mut self, builder: SharedBuilder) -> bool {
        let id = NodeId::of(&builder);
        if self.nodes.contains_key(&id) {
            return false;
        }
        let (name, stop) = {
            let guard = lock(&builder);
            (guard.name().to_string(), guard.stop_handle())
        };
        self.graph.add_node(id);
        self.nodes.insert(id, Node { builder, name, stop });
        self.order.push(id);
        true
    }

    /// Unregisters `builder` together with its edges.
    pub fn remove(&mut self, builder: &SharedBuilder) -> bool {
        let id = NodeId::of(builder);
        if self.nodes.remove(&id).is_none() {
            return false;
        }
        self.graph.remove_node(id);
        self.order.retain(|n| *n != id);
        true
    }

    /// Records that `dependent` builds after `dependency`.
    ///
    /// Returns `true` only if a new edge was added: self-dependencies,
    /// unregistered builders and existing edges are ignored.
    pub fn depends_on(&mut self, dependent: &SharedBuilder, dependency: &SharedBuilder) -> bool {
        let from = NodeId::of(dependency);
        let to = NodeId::of(dependent);
        if from == to || !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            return false;
        }
        if self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Returns `true` if `builder` is registered.
    pub fn contains(&self, builder: &SharedBuilder) -> bool {
        self.nodes.contains_key(&NodeId::of(builder))
    }

    /// Number of registered builders.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no builders are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    /// The builder registered under `id`.
    pub fn builder(&self, id: NodeId) -> Option<&SharedBuilder> {
        self.nodes.get(&id).map(|n| &n.builder)
    }

    /// The name captured when `id` was registered.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    /// The stop handle captured when `id` was registered.
    pub fn stop_handle(&self, id: NodeId) -> Option<&StopHandle> {
        self.nodes.get(&id).map(|n| &n.stop)
    }

    /// Looks a builder up by the name it had when registered.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.name(*id) == Some(name))
    }

    /// Dependencies first. Whenever several builders are ready the earliest
    /// registered goes next. Builders in a cycle never become ready, and
    /// neither does anything downstream of one.
    pub fn build_order(&self) -> Vec<NodeId> {
        let position: HashMap<NodeId, usize> =
            self.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut pending: HashMap<NodeId, usize> = self
            .order
            .iter()
            .map(|id| {
                let incoming = self.graph.neighbors_directed(*id, Direction::Incoming).count();
                (*id, incoming)
            })
            .collect();
        let mut ready: BTreeSet<(usize, NodeId)> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| (position[id], *id))
            .collect();

        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some((_, id)) = ready.pop_first() {
            sorted.push(id);
            for next in self.graph.neighbors_directed(id, Direction::Outgoing) {
                if let Some(count) = pending.get_mut(&next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((position[&next], next));
                    }
                }
            }
        }
        sorted
    }

    /// Each cycle's members, in insertion order within and across cycles.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let position: HashMap<NodeId, usize> =
            self.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut cycles: Vec<Vec<NodeId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|id| self.graph.contains_edge(*id, *id))
            })
            .map(|mut scc| {
                scc.sort_by_key(|id| position[id]);
                scc
            })
            .collect();
        cycles.sort_by_key(|scc| position[&scc[0]]);
        cycles
    }

    /// Every builder that participates in a cycle, in insertion order. Empty
    /// when the graph is acyclic.
    pub fn detect_cycles(&self) -> Vec<NodeId> {
        let members: HashSet<NodeId> = self.cycles().into_iter().flatten().collect();
        self.order
            .iter()
            .copied()
            .filter(|id| members.contains(id))
            .collect()
    }

    /// Builders left out of the build order without being in a cycle
    /// themselves.
    pub fn blocked(&self) -> Vec<NodeId> {
        let ordered: HashSet<NodeId> = self.build_order().into_iter().collect();
        let cyclic: HashSet<NodeId> = self.detect_cycles().into_iter().collect();
        self.order
            .iter()
            .copied()
            .filter(|id| !ordered.contains(id) && !cyclic.contains(id))
            .collect()
    }
}

impl std::fmt::Debug for BuildGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.order.iter().filter_map(|id| self.name(*id)).collect();
        f.debug_struct("BuildGraph")
            .field("nodes", &names)
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}
