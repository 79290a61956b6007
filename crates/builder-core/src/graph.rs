//! In-memory editing graph: nodes, edges and the current selection.
//!
//! Every mutation is synchronous and keeps the graph's invariants: edges
//! only reference existing nodes, at most one edge exists per ordered port
//! pair, and the selection (if any) names an existing node. Mutations that
//! target a missing node or edge are no-ops, since UI callbacks may race
//! with structural edits.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::node::{ConfigMap, Node, NodeId, NodeKind, Position, default_config};

/// Region new nodes land in when no drop position is given.
const SPAWN_MIN: f64 = 100.0;
const SPAWN_MAX: f64 = 500.0;

/// Directed connection from an output port to an input port. Its identity is
/// the full (source, source port, target, target port) tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub source_port: String,
    pub target: NodeId,
    pub target_port: String,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        source_port: impl Into<String>,
        target: impl Into<NodeId>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }

    pub fn touches(&self, node_id: &NodeId) -> bool {
        self.source == *node_id || self.target == *node_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cannot connect {source_id} -> {target_id}: node '{missing}' does not exist")]
    MissingEndpoint {
        source_id: NodeId,
        target_id: NodeId,
        missing: NodeId,
    },
    #[error("node '{0}' already exists")]
    DuplicateNode(NodeId),
}

/// The editing graph. Nodes keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    edges: Vec<Edge>,
    selected: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node of `kind` with the registry's default config. Without a
    /// position the node is placed at a random point in the spawn region.
    pub fn add_node(&mut self, kind: NodeKind, position: Option<Position>) -> NodeId {
        let mut id = NodeId::generate();
        while self.nodes.contains_key(&id) {
            id = NodeId::generate();
        }
        let position = position.unwrap_or_else(spawn_position);
        let node = Node::new(id.clone(), kind, position, default_config(kind));
        self.nodes.insert(id.clone(), node);
        debug!(node_id = %id, kind = %kind, x = position.x, y = position.y, "node added");
        id
    }

    /// Insert a fully built node (hydration path). Fails if the id is taken.
    pub fn insert_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().clone()));
        }
        self.nodes.insert(node.id().clone(), node);
        Ok(())
    }

    /// Shallow-merge `partial` into the node's config. Keys outside the
    /// kind's template are ignored. Returns false if the node does not exist.
    pub fn patch_config(&mut self, node_id: &NodeId, partial: ConfigMap) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            debug!(node_id = %node_id, "patch ignored: node not found");
            return false;
        };
        for (key, value) in partial {
            match node.config.get_mut(&key) {
                Some(slot) => *slot = value,
                None => warn!(node_id = %node_id, key = %key, "patch key not in template, dropped"),
            }
        }
        true
    }

    pub fn move_node(&mut self, node_id: &NodeId, position: Position) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Remove the node, every edge touching it, and the selection if it
    /// pointed at it. Returns false if the node did not exist.
    pub fn delete_node(&mut self, node_id: &NodeId) -> bool {
        if self.nodes.shift_remove(node_id).is_none() {
            return false;
        }
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(node_id));
        if self.selected.as_ref() == Some(node_id) {
            self.selected = None;
        }
        debug!(
            node_id = %node_id,
            edges_removed = before - self.edges.len(),
            "node deleted"
        );
        true
    }

    /// Connect two ports. Connecting an existing pair again leaves a single edge.
    pub fn connect(
        &mut self,
        source: &NodeId,
        source_port: &str,
        target: &NodeId,
        target_port: &str,
    ) -> Result<(), GraphError> {
        for id in [source, target] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::MissingEndpoint {
                    source_id: source.clone(),
                    target_id: target.clone(),
                    missing: id.clone(),
                });
            }
        }
        let edge = Edge::new(source.clone(), source_port, target.clone(), target_port);
        match self.edges.iter_mut().find(|e| **e == edge) {
            Some(existing) => *existing = edge,
            None => {
                debug!(
                    source = %source, source_port, target = %target, target_port,
                    "edge connected"
                );
                self.edges.push(edge);
            }
        }
        Ok(())
    }

    /// Returns false if no such edge existed.
    pub fn disconnect(&mut self, edge: &Edge) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != edge);
        before != self.edges.len()
    }

    /// Set or clear the selection. Selecting a missing node changes nothing
    /// and returns false.
    pub fn select(&mut self, node_id: Option<&NodeId>) -> bool {
        match node_id {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.nodes.contains_key(id) => {
                self.selected = Some(id.clone());
                true
            }
            Some(_) => false,
        }
    }

    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn spawn_position() -> Position {
    Position::new(
        rand::random_range(SPAWN_MIN..SPAWN_MAX),
        rand::random_range(SPAWN_MIN..SPAWN_MAX),
    )
}
