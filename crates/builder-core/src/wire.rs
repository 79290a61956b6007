//! Backend wire schema: persisted workflows, create/update drafts, validation
//! reports, upload receipts and chat messages.
//!
//! # Connection identity quirk
//!
//! `source_component_id` / `target_component_id` on [`Connection`] and
//! [`ConnectionDraft`] carry **node identifiers**, not component identifiers,
//! despite their names. That is the backend's observed contract and it is kept
//! as-is; it may be a latent backend bug, but changing it would break
//! compatibility. [`crate::serialize`] is the only module that reads or writes
//! these fields.

use serde::{Deserialize, Deserializer, Serialize};

use crate::node::{ComponentId, ConfigMap, NodeId, WorkflowId};

/// A workflow as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<Component>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connections: Vec<Connection>,
}

/// Persisted form of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub node_id: NodeId,
    pub component_type: String,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: ConfigMap,
}

/// Persisted form of an edge. See the module docs for the id field quirk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub source_component_id: NodeId,
    pub target_component_id: NodeId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_handle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_handle: String,
}

/// Create/update request body. Carries no identifiers of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentDraft>,
    #[serde(default)]
    pub connections: Vec<ConnectionDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDraft {
    pub component_type: String,
    pub node_id: NodeId,
    pub position_x: f64,
    pub position_y: f64,
    #[serde(default)]
    pub config: ConfigMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDraft {
    pub source_component_id: NodeId,
    pub target_component_id: NodeId,
    pub source_handle: String,
    pub target_handle: String,
}

/// Result of the backend's structural check of a saved workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default, alias = "filename")]
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    pub session_id: String,
    pub role: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// Chat request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageCreate {
    pub workflow_id: WorkflowId,
    pub session_id: String,
    pub message: String,
    pub role: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
