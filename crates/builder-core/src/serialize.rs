//! Graph <-> persisted workflow conversion.
//!
//! This is the only place that puts node identifiers into the wire's
//! `*_component_id` connection fields (see [`crate::wire`]).

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::graph::{Graph, GraphError};
use crate::node::{Node, NodeId, NodeKind, Position};
use crate::translate::{to_backend_config, to_ui_config};
use crate::wire::{ComponentDraft, ConnectionDraft, WorkflowDraft, WorkflowRecord};

/// A persisted workflow that cannot be turned into an editing graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    #[error("component for node '{node_id}' has unsupported type '{component_type}'")]
    UnknownComponentType {
        node_id: NodeId,
        component_type: String,
    },
    #[error("node '{0}' appears in more than one component")]
    DuplicateNode(NodeId),
    #[error("connection {connection_id} references unknown node '{node_id}'")]
    DanglingConnection { connection_id: i64, node_id: NodeId },
}

/// Build an editing graph from a persisted workflow.
pub fn hydrate(record: &WorkflowRecord) -> Result<Graph, HydrationError> {
    let mut graph = Graph::new();
    for component in &record.components {
        let kind = NodeKind::from_component_type(&component.component_type).ok_or_else(|| {
            HydrationError::UnknownComponentType {
                node_id: component.node_id.clone(),
                component_type: component.component_type.clone(),
            }
        })?;
        let node = Node::new(
            component.node_id.clone(),
            kind,
            Position::new(component.position_x, component.position_y),
            to_ui_config(kind, &component.config),
        )
        .with_backend_component_id(component.id);
        graph
            .insert_node(node)
            .map_err(|_| HydrationError::DuplicateNode(component.node_id.clone()))?;
    }

    for connection in &record.connections {
        graph
            .connect(
                &connection.source_component_id,
                &connection.source_handle,
                &connection.target_component_id,
                &connection.target_handle,
            )
            .map_err(|err| match err {
                GraphError::MissingEndpoint { missing, .. } => HydrationError::DanglingConnection {
                    connection_id: connection.id,
                    node_id: missing,
                },
                GraphError::DuplicateNode(node_id) => HydrationError::DuplicateNode(node_id),
            })?;
    }

    debug!(
        workflow_id = %record.id,
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "workflow hydrated"
    );
    Ok(graph)
}

/// Flatten an editing graph into a create/update request.
///
/// Backend component ids are not emitted; the backend assigns them on receipt.
pub fn flatten(graph: &Graph, name: &str, description: Option<&str>) -> WorkflowDraft {
    let components = graph
        .nodes()
        .map(|node| ComponentDraft {
            component_type: node.kind().component_type().to_string(),
            node_id: node.id().clone(),
            position_x: node.position().x,
            position_y: node.position().y,
            config: to_backend_config(node.kind(), node.config()),
        })
        .collect();
    let connections = graph
        .edges()
        .iter()
        .map(|edge| ConnectionDraft {
            source_component_id: edge.source.clone(),
            target_component_id: edge.target.clone(),
            source_handle: edge.source_port.clone(),
            target_handle: edge.target_port.clone(),
        })
        .collect();
    WorkflowDraft {
        name: name.to_string(),
        description: description.map(str::to_string),
        components,
        connections,
    }
}

/// Copy backend-assigned component ids onto matching nodes after a save.
/// Returns the number of nodes updated. Nodes absent from `record` keep their
/// current id; components for unknown nodes are ignored.
pub fn adopt_component_ids(graph: &mut Graph, record: &WorkflowRecord) -> usize {
    let mut adopted = 0;
    let mut seen = HashSet::new();
    for component in &record.components {
        if !seen.insert(&component.node_id) {
            continue;
        }
        if let Some(node) = graph.node_mut(&component.node_id) {
            node.backend_component_id = Some(component.id);
            adopted += 1;
        }
    }
    adopted
}
