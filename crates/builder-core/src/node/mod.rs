//! Node model: identifiers, node kinds, positions and the node record itself.

mod registry;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub use registry::{Port, PortDirection, Ports, default_config, label, list_kinds, ports};

/// Kind-specific configuration (key -> JSON value).
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Editor-side node identifier. Unique within a graph and never reused.
///
/// New nodes get a UUID v4 in text form; hydrated nodes keep whatever the
/// persisted record carried.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh identifier for a node created in the editor.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// Integers are accepted so a foreign record whose connection fields carry
// numeric component ids still decodes and fails later with a precise error.
impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NodeId(s),
            RawId::Number(n) => NodeId(n.to_string()),
        })
    }
}

/// Durable component identifier assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub i64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable workflow identifier assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub i64);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds the builder supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "user_query")]
    Input,
    #[serde(rename = "knowledgebase")]
    KnowledgeBase,
    #[serde(rename = "llm_engine")]
    LLMEngine,
    #[serde(rename = "output")]
    Output,
}

impl NodeKind {
    /// Name used in the persisted `component_type` field.
    pub fn component_type(self) -> &'static str {
        match self {
            NodeKind::Input => "user_query",
            NodeKind::KnowledgeBase => "knowledgebase",
            NodeKind::LLMEngine => "llm_engine",
            NodeKind::Output => "output",
        }
    }

    pub fn from_component_type(value: &str) -> Option<Self> {
        match value {
            "user_query" => Some(NodeKind::Input),
            "knowledgebase" => Some(NodeKind::KnowledgeBase),
            "llm_engine" => Some(NodeKind::LLMEngine),
            "output" => Some(NodeKind::Output),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_type())
    }
}

/// Canvas-space position.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An editor-side node. The config always holds exactly the keys of the
/// kind's default template.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) position: Position,
    pub(crate) config: ConfigMap,
    pub(crate) backend_component_id: Option<ComponentId>,
}

impl Node {
    /// Build a node, normalizing `config` onto the kind's template: template
    /// keys missing from `config` are backfilled, keys outside it are dropped.
    pub fn new(id: NodeId, kind: NodeKind, position: Position, config: ConfigMap) -> Self {
        let mut normalized = default_config(kind);
        for (key, value) in config {
            if let Some(slot) = normalized.get_mut(&key) {
                *slot = value;
            }
        }
        Self {
            id,
            kind,
            position,
            config: normalized,
            backend_component_id: None,
        }
    }

    pub fn with_backend_component_id(mut self, id: ComponentId) -> Self {
        self.backend_component_id = Some(id);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> &'static str {
        label(self.kind)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Set only for nodes loaded from, or already saved to, the backend.
    pub fn backend_component_id(&self) -> Option<ComponentId> {
        self.backend_component_id
    }
}
