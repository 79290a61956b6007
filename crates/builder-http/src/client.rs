use async_trait::async_trait;
use builder_core::wire::{
    ChatMessage, ChatMessageCreate, UploadReceipt, ValidationReport, WorkflowDraft, WorkflowRecord,
};
use builder_core::{
    ApiError, ChatApi, DocumentUploadApi, NodeId, PersistenceApi, PickedFile, WorkflowId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;

/// REST client for the workflow backend. Implements every collaborator
/// contract the builder session needs.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;
        debug!(base_url = %config.base_url, timeout = ?config.timeout, "backend client initialized");
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("request failed: {e}")))?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("failed to read response body: {e}")))?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "backend response");
        interpret(status, &body)
    }
}

/// Turn a status and body into a typed result. Non-success statuses carry the
/// backend's `detail` message when it has one.
fn interpret<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        let message = error_detail(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
        });
        return Err(ApiError::status(status.as_u16(), message));
    }
    serde_json::from_str(body).map_err(|e| ApiError::decode(format!("unexpected response body: {e}")))
}

/// FastAPI error bodies are `{"detail": "..."}` or, for request validation,
/// `{"detail": [{"loc": [...], "msg": "..."}]}`.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl PersistenceApi for HttpBackend {
    async fn list(&self) -> Result<Vec<WorkflowRecord>, ApiError> {
        self.execute(self.client.get(self.config.url("/api/workflows")))
            .await
    }

    async fn get(&self, id: WorkflowId) -> Result<WorkflowRecord, ApiError> {
        self.execute(self.client.get(self.config.url(&format!("/api/workflows/{id}"))))
            .await
    }

    async fn create(&self, draft: &WorkflowDraft) -> Result<WorkflowRecord, ApiError> {
        self.execute(self.client.post(self.config.url("/api/workflows")).json(draft))
            .await
    }

    async fn update(
        &self,
        id: WorkflowId,
        draft: &WorkflowDraft,
    ) -> Result<WorkflowRecord, ApiError> {
        self.execute(
            self.client
                .put(self.config.url(&format!("/api/workflows/{id}")))
                .json(draft),
        )
        .await
    }

    async fn validate(&self, id: WorkflowId) -> Result<ValidationReport, ApiError> {
        self.execute(
            self.client
                .post(self.config.url(&format!("/api/workflows/{id}/validate"))),
        )
        .await
    }
}

#[async_trait]
impl DocumentUploadApi for HttpBackend {
    async fn upload(&self, file: &PickedFile, node_id: &NodeId) -> Result<UploadReceipt, ApiError> {
        let form = Form::new()
            .part(
                "file",
                Part::bytes(file.bytes.clone()).file_name(file.name.clone()),
            )
            .text("component_id", node_id.to_string());
        debug!(node_id = %node_id, file = %file.name, size = file.bytes.len(), "uploading document");
        self.execute(
            self.client
                .post(self.config.url("/api/documents/upload"))
                .multipart(form),
        )
        .await
    }
}

#[async_trait]
impl ChatApi for HttpBackend {
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.execute(
            self.client
                .get(self.config.url(&format!("/api/chat/history/{session_id}"))),
        )
        .await
    }

    async fn send_message(
        &self,
        workflow_id: WorkflowId,
        session_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ApiError> {
        let body = ChatMessageCreate {
            workflow_id,
            session_id: session_id.to_string(),
            message: text.to_string(),
            role: "user".into(),
        };
        self.execute(
            self.client
                .post(self.config.url("/api/chat/message"))
                .json(&body),
        )
        .await
    }
}
