//! Chat against a saved workflow.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, ChatApi};
use crate::node::WorkflowId;
use crate::wire::ChatMessage;

pub const NO_WORKFLOW_NOTICE: &str = "No workflow selected. Please select a workflow first.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("No workflow selected. Please select a workflow first.")]
    NoWorkflow,
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Collaborator(#[from] ApiError),
}

impl ChatError {
    /// Text shown in place of an assistant reply.
    pub fn notice(&self) -> String {
        match self {
            Self::Collaborator(err) => format!("Error: {}", err.message()),
            other => format!("Error: {other}"),
        }
    }
}

/// One conversation. The session id is generated once and reused for every
/// message and history lookup.
pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    workflow_id: Option<WorkflowId>,
    session_id: String,
}

impl ChatSession {
    pub fn new(api: Arc<dyn ChatApi>, workflow_id: Option<WorkflowId>) -> Self {
        Self::with_session_id(api, workflow_id, Uuid::new_v4().to_string())
    }

    /// Resume an existing conversation.
    pub fn with_session_id(
        api: Arc<dyn ChatApi>,
        workflow_id: Option<WorkflowId>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            workflow_id,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workflow_id(&self) -> Option<WorkflowId> {
        self.workflow_id
    }

    pub async fn history(&self) -> Result<Vec<ChatMessage>, ChatError> {
        if self.workflow_id.is_none() {
            return Err(ChatError::NoWorkflow);
        }
        let messages = self
            .api
            .history(&self.session_id)
            .await
            .inspect_err(|err| warn!(session_id = %self.session_id, error = %err, "chat history unavailable"))?;
        debug!(session_id = %self.session_id, messages = messages.len(), "chat history loaded");
        Ok(messages)
    }

    /// Send a user message and return the assistant's reply. Surrounding
    /// whitespace is trimmed; nothing is sent for a blank message or when no
    /// workflow is bound.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let Some(workflow_id) = self.workflow_id else {
            return Err(ChatError::NoWorkflow);
        };
        let reply = self
            .api
            .send_message(workflow_id, &self.session_id, text)
            .await?;
        info!(
            workflow_id = %workflow_id,
            session_id = %self.session_id,
            reply_chars = reply.message.len(),
            "chat reply received"
        );
        Ok(reply)
    }
}
