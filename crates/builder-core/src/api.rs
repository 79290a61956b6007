//! Collaborator contracts: persistence, document upload, chat and file picking.
//!
//! Implementations live outside this crate (see `builder-http`); tests use
//! in-memory fakes.

use async_trait::async_trait;

use crate::node::{NodeId, WorkflowId};
use crate::wire::{ChatMessage, UploadReceipt, ValidationReport, WorkflowDraft, WorkflowRecord};

/// A collaborator call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request never got a response (connect, timeout, I/O).
    #[error("transport error: {0}")]
    Transport(String),
    /// Backend answered with a non-success status.
    #[error("backend error ({status}): {message}")]
    Status { status: u16, message: String },
    /// Response body did not match the expected schema.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Human-readable message, suitable for showing to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(message) | Self::Decode(message) => message,
            Self::Status { message, .. } => message,
        }
    }
}

/// Workflow storage on the backend.
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    async fn list(&self) -> Result<Vec<WorkflowRecord>, ApiError>;

    async fn get(&self, id: WorkflowId) -> Result<WorkflowRecord, ApiError>;

    async fn create(&self, draft: &WorkflowDraft) -> Result<WorkflowRecord, ApiError>;

    async fn update(&self, id: WorkflowId, draft: &WorkflowDraft)
    -> Result<WorkflowRecord, ApiError>;

    async fn validate(&self, id: WorkflowId) -> Result<ValidationReport, ApiError>;
}

/// A file chosen by the user for a knowledge-base node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Knowledge-base document upload.
#[async_trait]
pub trait DocumentUploadApi: Send + Sync {
    async fn upload(&self, file: &PickedFile, node_id: &NodeId) -> Result<UploadReceipt, ApiError>;
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError>;

    async fn send_message(
        &self,
        workflow_id: WorkflowId,
        session_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ApiError>;
}

/// File selection capability supplied by the hosting UI. `None` means the
/// user dismissed the picker.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self, node_id: &NodeId) -> Option<PickedFile>;
}
