//! In-memory collaborators for unit tests. Each one records the calls it
//! receives so tests can assert on zero-call paths.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{ApiError, ChatApi, DocumentUploadApi, FilePicker, PersistenceApi, PickedFile};
use crate::node::{ComponentId, NodeId, WorkflowId};
use crate::wire::{
    ChatMessage, Component, Connection, UploadReceipt, ValidationReport, WorkflowDraft,
    WorkflowRecord,
};

#[derive(Default)]
struct Store {
    records: BTreeMap<WorkflowId, WorkflowRecord>,
    next_component_id: i64,
    calls: Vec<String>,
    fail_next: Option<ApiError>,
}

impl Store {
    fn next_workflow_id(&self) -> WorkflowId {
        WorkflowId(self.records.keys().last().map_or(1, |id| id.0 + 1))
    }

    fn persist(&mut self, id: WorkflowId, draft: &WorkflowDraft) -> WorkflowRecord {
        let components = draft
            .components
            .iter()
            .map(|c| {
                self.next_component_id += 1;
                Component {
                    id: ComponentId(self.next_component_id),
                    node_id: c.node_id.clone(),
                    component_type: c.component_type.clone(),
                    position_x: c.position_x,
                    position_y: c.position_y,
                    config: c.config.clone(),
                }
            })
            .collect();
        let connections = draft
            .connections
            .iter()
            .zip(1..)
            .map(|(c, cid)| Connection {
                id: cid,
                source_component_id: c.source_component_id.clone(),
                target_component_id: c.target_component_id.clone(),
                source_handle: c.source_handle.clone(),
                target_handle: c.target_handle.clone(),
            })
            .collect();
        let record = WorkflowRecord {
            id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            components,
            connections,
        };
        self.records.insert(id, record.clone());
        record
    }
}

/// Workflow store behaving like the backend: fresh component ids on every
/// write, 404 for unknown workflows.
#[derive(Default)]
pub struct FakePersistence {
    store: Mutex<Store>,
    gate: Option<Notify>,
}

impl FakePersistence {
    /// Writes block until [`FakePersistence::release`] is called.
    pub fn gated() -> Self {
        Self {
            store: Mutex::default(),
            gate: Some(Notify::new()),
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn fail_next(&self, err: ApiError) {
        self.store.lock().unwrap().fail_next = Some(err);
    }

    pub fn insert_raw(&self, raw: serde_json::Value) {
        let record: WorkflowRecord = serde_json::from_value(raw).unwrap();
        self.store.lock().unwrap().records.insert(record.id, record);
    }

    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    fn begin(&self, call: String) -> Result<std::sync::MutexGuard<'_, Store>, ApiError> {
        let mut store = self.store.lock().unwrap();
        store.calls.push(call);
        match store.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(store),
        }
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

fn not_found() -> ApiError {
    ApiError::status(404, "Workflow not found")
}

#[async_trait]
impl PersistenceApi for FakePersistence {
    async fn list(&self) -> Result<Vec<WorkflowRecord>, ApiError> {
        let store = self.begin("list".into())?;
        Ok(store.records.values().cloned().collect())
    }

    async fn get(&self, id: WorkflowId) -> Result<WorkflowRecord, ApiError> {
        let store = self.begin(format!("get {id}"))?;
        store.records.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create(&self, draft: &WorkflowDraft) -> Result<WorkflowRecord, ApiError> {
        self.wait_for_gate().await;
        let mut store = self.begin("create".into())?;
        let id = store.next_workflow_id();
        Ok(store.persist(id, draft))
    }

    async fn update(
        &self,
        id: WorkflowId,
        draft: &WorkflowDraft,
    ) -> Result<WorkflowRecord, ApiError> {
        self.wait_for_gate().await;
        let mut store = self.begin(format!("update {id}"))?;
        if !store.records.contains_key(&id) {
            return Err(not_found());
        }
        Ok(store.persist(id, draft))
    }

    async fn validate(&self, id: WorkflowId) -> Result<ValidationReport, ApiError> {
        let store = self.begin(format!("validate {id}"))?;
        let record = store.records.get(&id).ok_or_else(not_found)?;
        Ok(if record.components.is_empty() {
            ValidationReport {
                valid: false,
                error: Some("Workflow has no components".into()),
            }
        } else {
            ValidationReport {
                valid: true,
                error: None,
            }
        })
    }
}

#[derive(Default)]
pub struct RecordingUploads {
    uploaded: Mutex<Vec<(NodeId, String)>>,
}

impl RecordingUploads {
    pub fn uploaded(&self) -> Vec<(NodeId, String)> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentUploadApi for RecordingUploads {
    async fn upload(&self, file: &PickedFile, node_id: &NodeId) -> Result<UploadReceipt, ApiError> {
        self.uploaded
            .lock()
            .unwrap()
            .push((node_id.clone(), file.name.clone()));
        Ok(UploadReceipt {
            file_name: file.name.clone(),
        })
    }
}

pub struct FailingUploads;

#[async_trait]
impl DocumentUploadApi for FailingUploads {
    async fn upload(&self, _file: &PickedFile, _node_id: &NodeId) -> Result<UploadReceipt, ApiError> {
        Err(ApiError::transport("connection refused"))
    }
}

pub struct StaticPicker(pub Option<PickedFile>);

#[async_trait]
impl FilePicker for StaticPicker {
    async fn pick(&self, _node_id: &NodeId) -> Option<PickedFile> {
        self.0.clone()
    }
}

#[derive(Default)]
struct Transcript {
    calls: Vec<String>,
    messages: Vec<ChatMessage>,
}

/// Chat backend that echoes every message back.
#[derive(Default)]
pub struct FakeChat {
    transcript: Mutex<Transcript>,
    failure: Option<ApiError>,
}

impl FakeChat {
    pub fn failing(err: ApiError) -> Self {
        Self {
            transcript: Mutex::default(),
            failure: Some(err),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.transcript.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let mut transcript = self.transcript.lock().unwrap();
        transcript.calls.push(format!("history {session_id}"));
        Ok(transcript
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn send_message(
        &self,
        workflow_id: WorkflowId,
        session_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ApiError> {
        let mut transcript = self.transcript.lock().unwrap();
        transcript
            .calls
            .push(format!("send {workflow_id} {session_id} {text}"));
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let question = chat_message(&transcript, workflow_id, session_id, "user", text.into());
        transcript.messages.push(question);
        let reply = chat_message(
            &transcript,
            workflow_id,
            session_id,
            "assistant",
            format!("echo: {text}"),
        );
        transcript.messages.push(reply.clone());
        Ok(reply)
    }
}

fn chat_message(
    transcript: &Transcript,
    workflow_id: WorkflowId,
    session_id: &str,
    role: &str,
    message: String,
) -> ChatMessage {
    ChatMessage {
        id: transcript.messages.len() as i64 + 1,
        workflow_id: Some(workflow_id),
        session_id: session_id.to_string(),
        role: role.to_string(),
        message,
        metadata: None,
        created_at: "2024-05-01T10:00:00".into(),
    }
}
