pub mod api;
pub mod chat;
pub mod graph;
pub mod node;
pub mod observability;
pub mod serialize;
pub mod session;
pub mod translate;
pub mod wire;

#[cfg(test)]
mod testing;

// User-facing API: Graph, NodeKind, BuilderSession, ChatSession and the collaborator traits.
pub use api::{ApiError, ChatApi, DocumentUploadApi, FilePicker, PersistenceApi, PickedFile};
pub use chat::{ChatError, ChatSession, NO_WORKFLOW_NOTICE};
pub use graph::{Edge, Graph, GraphError};
pub use node::{ComponentId, ConfigMap, Node, NodeId, NodeKind, Position, WorkflowId};
pub use observability::init_observability;
pub use serialize::{HydrationError, flatten, hydrate};
pub use session::{BuilderSession, Phase, SessionError, UploadOutcome};
