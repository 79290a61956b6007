//! Builder session: owns the editing graph for one open workflow and runs
//! load, save and validate against the persistence collaborator.
//!
//! Phases move `Empty -> Loading -> Ready`, `Ready -> Saving -> Ready` and
//! `Ready -> Validating -> Ready`. Only one of those operations runs at a time;
//! starting another while one is in flight fails with [`SessionError::Busy`].
//! A failed operation puts the session back in the phase it started from and
//! leaves the graph untouched. Graph edits are synchronous and go through
//! [`BuilderSession::edit`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ChatApi, DocumentUploadApi, FilePicker, PersistenceApi, PickedFile};
use crate::chat::ChatSession;
use crate::graph::Graph;
use crate::node::{ConfigMap, Node, NodeId, NodeKind, WorkflowId};
use crate::serialize::{HydrationError, adopt_component_ids, flatten, hydrate};
use crate::wire::{ValidationReport, WorkflowDraft, WorkflowRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No workflow open.
    #[default]
    Empty,
    Loading,
    Ready,
    Saving,
    Validating,
}

impl Phase {
    fn is_idle(self) -> bool {
        matches!(self, Phase::Empty | Phase::Ready)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Empty => "empty",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Saving => "saving",
            Phase::Validating => "validating",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Request rejected before any collaborator call.
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid workflow record: {0}")]
    Hydration(#[from] HydrationError),
    #[error(transparent)]
    Collaborator(#[from] ApiError),
    #[error("another operation is in progress (session is {phase})")]
    Busy { phase: Phase },
}

impl SessionError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result of a knowledge-base upload. The node records the file name in both
/// cases; a failed upload is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { file_name: String },
    Failed { file_name: String, message: String },
}

impl UploadOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Uploaded { file_name } | Self::Failed { file_name, .. } => file_name,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    phase: Phase,
    graph: Option<Graph>,
    workflow_id: Option<WorkflowId>,
    name: String,
    description: Option<String>,
}

/// Marks an operation in flight. Restores the starting phase when dropped
/// without [`PhaseGuard::settle`], including when the owning future is dropped.
struct PhaseGuard {
    shared: Arc<Mutex<SessionState>>,
    restore: Phase,
    armed: bool,
}

impl PhaseGuard {
    fn enter(
        shared: &Arc<Mutex<SessionState>>,
        state: &mut SessionState,
        next: Phase,
    ) -> Result<Self, SessionError> {
        if !state.phase.is_idle() {
            return Err(SessionError::Busy { phase: state.phase });
        }
        let restore = state.phase;
        state.phase = next;
        debug!(from = %restore, to = %next, "session phase");
        Ok(Self {
            shared: Arc::clone(shared),
            restore,
            armed: true,
        })
    }

    fn settle(mut self, state: &mut SessionState, phase: Phase) {
        state.phase = phase;
        self.armed = false;
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(&self.shared);
            state.phase = self.restore;
            debug!(to = %self.restore, "session phase restored");
        }
    }
}

fn lock(shared: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one builder session. Clones share the same state.
#[derive(Clone)]
pub struct BuilderSession {
    state: Arc<Mutex<SessionState>>,
    persistence: Arc<dyn PersistenceApi>,
    uploads: Option<Arc<dyn DocumentUploadApi>>,
}

impl BuilderSession {
    pub fn new(persistence: Arc<dyn PersistenceApi>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            persistence,
            uploads: None,
        }
    }

    pub fn with_uploads(mut self, uploads: Arc<dyn DocumentUploadApi>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Set once the workflow has been loaded from or saved to the backend.
    pub fn workflow_id(&self) -> Option<WorkflowId> {
        self.lock().workflow_id
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn description(&self) -> Option<String> {
        self.lock().description.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock().name = name.into();
    }

    pub fn set_description(&self, description: Option<String>) {
        self.lock().description = description;
    }

    /// Copy of the current graph, if a workflow is open.
    pub fn snapshot(&self) -> Option<Graph> {
        self.lock().graph.clone()
    }

    /// Run a synchronous mutation against the graph. Returns `None` when no
    /// workflow is open.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> Option<R> {
        self.lock().graph.as_mut().map(f)
    }

    /// Start an unsaved workflow with an empty graph.
    pub fn start_new(&self, name: impl Into<String>) -> Result<(), SessionError> {
        let mut state = self.lock();
        if !state.phase.is_idle() {
            return Err(SessionError::Busy { phase: state.phase });
        }
        state.graph = Some(Graph::new());
        state.workflow_id = None;
        state.name = name.into();
        state.description = None;
        state.phase = Phase::Ready;
        info!(name = %state.name, "started new workflow");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<WorkflowRecord>, SessionError> {
        Ok(self.persistence.list().await?)
    }

    /// Create an empty workflow on the backend and open it.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkflowRecord, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::validation("Please enter a workflow name"));
        }
        let draft = WorkflowDraft {
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            components: Vec::new(),
            connections: Vec::new(),
        };
        let guard = {
            let mut state = self.lock();
            PhaseGuard::enter(&self.state, &mut state, Phase::Saving)?
        };
        let record = self
            .persistence
            .create(&draft)
            .await
            .inspect_err(|err| error!(error = %err, "create workflow failed"))?;
        let graph = hydrate(&record)?;

        let mut state = self.lock();
        state.graph = Some(graph);
        state.workflow_id = Some(record.id);
        state.name = record.name.clone();
        state.description = record.description.clone();
        guard.settle(&mut state, Phase::Ready);
        info!(workflow_id = %record.id, "workflow created");
        Ok(record)
    }

    /// Load a persisted workflow, replacing the current graph on success.
    pub async fn open(&self, id: WorkflowId) -> Result<(), SessionError> {
        let guard = {
            let mut state = self.lock();
            PhaseGuard::enter(&self.state, &mut state, Phase::Loading)?
        };
        info!(workflow_id = %id, "loading workflow");
        let record = self
            .persistence
            .get(id)
            .await
            .inspect_err(|err| error!(workflow_id = %id, error = %err, "load failed"))?;
        let graph =
            hydrate(&record).inspect_err(|err| error!(workflow_id = %id, error = %err, "load failed"))?;

        let mut state = self.lock();
        state.graph = Some(graph);
        state.workflow_id = Some(record.id);
        state.name = record.name;
        state.description = record.description;
        guard.settle(&mut state, Phase::Ready);
        info!(workflow_id = %id, "workflow ready");
        Ok(())
    }

    /// Flatten the graph and persist it: `create` the first time, `update`
    /// afterwards. The name must be non-blank; that is checked before any
    /// collaborator call.
    pub async fn save(&self) -> Result<WorkflowRecord, SessionError> {
        let (guard, draft, existing) = {
            let mut state = self.lock();
            let Some(graph) = state.graph.as_ref() else {
                return Err(SessionError::validation("No workflow is open"));
            };
            if state.name.trim().is_empty() {
                return Err(SessionError::validation("Please enter a workflow name"));
            }
            let draft = flatten(graph, &state.name, state.description.as_deref());
            let existing = state.workflow_id;
            let guard = PhaseGuard::enter(&self.state, &mut state, Phase::Saving)?;
            (guard, draft, existing)
        };

        info!(
            workflow_id = ?existing,
            components = draft.components.len(),
            connections = draft.connections.len(),
            "saving workflow"
        );
        let result = match existing {
            Some(id) => self.persistence.update(id, &draft).await,
            None => self.persistence.create(&draft).await,
        };
        let record = result.inspect_err(|err| error!(error = %err, "save failed"))?;

        let mut state = self.lock();
        state.workflow_id = Some(record.id);
        let adopted = state
            .graph
            .as_mut()
            .map_or(0, |graph| adopt_component_ids(graph, &record));
        guard.settle(&mut state, Phase::Ready);
        info!(workflow_id = %record.id, components = adopted, "workflow saved");
        Ok(record)
    }

    /// Ask the backend to check the saved workflow. Requires a prior save.
    /// An invalid workflow is a successful call with `valid == false`.
    pub async fn validate(&self) -> Result<ValidationReport, SessionError> {
        let (guard, id) = {
            let mut state = self.lock();
            let Some(id) = state.workflow_id else {
                return Err(SessionError::validation("Please save the workflow first"));
            };
            let guard = PhaseGuard::enter(&self.state, &mut state, Phase::Validating)?;
            (guard, id)
        };

        let report = self
            .persistence
            .validate(id)
            .await
            .inspect_err(|err| error!(workflow_id = %id, error = %err, "validation call failed"))?;

        let mut state = self.lock();
        guard.settle(&mut state, Phase::Ready);
        if report.valid {
            info!(workflow_id = %id, "workflow is valid");
        } else {
            warn!(workflow_id = %id, reason = ?report.error, "workflow is invalid");
        }
        Ok(report)
    }

    /// Upload a document for a knowledge-base node. The node's `file_name` is
    /// set to the attempted file whether or not the upload succeeds.
    pub async fn upload_document(
        &self,
        node_id: &NodeId,
        file: PickedFile,
    ) -> Result<UploadOutcome, SessionError> {
        self.ensure_knowledge_base(node_id)?;
        let result = match &self.uploads {
            Some(uploads) => uploads.upload(&file, node_id).await,
            None => Err(ApiError::transport("no document upload service configured")),
        };
        self.record_file_name(node_id, &file.name);
        match result {
            Ok(receipt) => {
                info!(node_id = %node_id, file = %receipt.file_name, "document uploaded");
                Ok(UploadOutcome::Uploaded {
                    file_name: file.name,
                })
            }
            Err(err) => {
                warn!(node_id = %node_id, file = %file.name, error = %err, "document upload failed");
                Ok(UploadOutcome::Failed {
                    file_name: file.name,
                    message: err.message().to_string(),
                })
            }
        }
    }

    /// Ask the host UI for a file, then upload it. `Ok(None)` if the user
    /// dismissed the picker.
    pub async fn pick_and_upload(
        &self,
        node_id: &NodeId,
        picker: &dyn FilePicker,
    ) -> Result<Option<UploadOutcome>, SessionError> {
        self.ensure_knowledge_base(node_id)?;
        let Some(file) = picker.pick(node_id).await else {
            debug!(node_id = %node_id, "file selection dismissed");
            return Ok(None);
        };
        self.upload_document(node_id, file).await.map(Some)
    }

    /// Chat session bound to the saved workflow (if any).
    pub fn chat(&self, api: Arc<dyn ChatApi>) -> ChatSession {
        ChatSession::new(api, self.workflow_id())
    }

    fn ensure_knowledge_base(&self, node_id: &NodeId) -> Result<(), SessionError> {
        let state = self.lock();
        let kind = state
            .graph
            .as_ref()
            .and_then(|g| g.node(node_id))
            .map(Node::kind);
        match kind {
            Some(NodeKind::KnowledgeBase) => Ok(()),
            Some(other) => Err(SessionError::validation(format!(
                "node {node_id} is a {other} node; documents attach to knowledge base nodes"
            ))),
            None => Err(SessionError::validation(format!(
                "node {node_id} does not exist"
            ))),
        }
    }

    fn record_file_name(&self, node_id: &NodeId, file_name: &str) {
        let mut patch = ConfigMap::new();
        patch.insert("file_name".into(), json!(file_name));
        self.edit(|graph| graph.patch_config(node_id, patch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::node::{Position, list_kinds};
    use crate::testing::{FailingUploads, FakePersistence, RecordingUploads, StaticPicker};
    use std::time::Duration;

    fn session(fake: &Arc<FakePersistence>) -> BuilderSession {
        BuilderSession::new(fake.clone())
    }

    fn build_pipeline(session: &BuilderSession) -> (NodeId, NodeId) {
        session
            .edit(|g| {
                let q = g.add_node(NodeKind::Input, Some(Position::new(0.0, 0.0)));
                let llm = g.add_node(NodeKind::LLMEngine, Some(Position::new(250.0, 0.0)));
                g.connect(&q, "query", &llm, "context").unwrap();
                (q, llm)
            })
            .unwrap()
    }

    #[tokio::test]
    async fn save_with_blank_name_makes_no_calls() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("   ").unwrap();
        build_pipeline(&s);
        let err = s.save().await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert!(fake.calls().is_empty());
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn validate_before_save_makes_no_calls() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("Draft").unwrap();
        let err = s.validate().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Validation("Please save the workflow first".into())
        );
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn first_save_creates_then_updates() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("Support bot").unwrap();
        let (q, llm) = build_pipeline(&s);

        let record = s.save().await.unwrap();
        assert_eq!(s.workflow_id(), Some(record.id));
        let graph = s.snapshot().unwrap();
        assert!(graph.node(&q).unwrap().backend_component_id().is_some());
        assert!(graph.node(&llm).unwrap().backend_component_id().is_some());

        s.save().await.unwrap();
        assert_eq!(fake.calls(), vec!["create".to_string(), format!("update {}", record.id)]);
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn validate_after_save_reports_backend_verdict() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("Empty one").unwrap();
        s.save().await.unwrap();
        let report = s.validate().await.unwrap();
        assert!(!report.valid);
        assert!(report.error.is_some());

        build_pipeline(&s);
        s.save().await.unwrap();
        assert!(s.validate().await.unwrap().valid);
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn open_hydrates_saved_workflow() {
        let fake = Arc::new(FakePersistence::default());
        let writer = session(&fake);
        writer.start_new("Shared").unwrap();
        let (q, llm) = build_pipeline(&writer);
        let saved = writer.save().await.unwrap();

        let reader = session(&fake);
        assert_eq!(reader.phase(), Phase::Empty);
        reader.open(saved.id).await.unwrap();
        assert_eq!(reader.phase(), Phase::Ready);
        assert_eq!(reader.name(), "Shared");
        let graph = reader.snapshot().unwrap();
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edges(), &[Edge::new(q, "query", llm, "context")]);
    }

    #[tokio::test]
    async fn failed_open_returns_to_empty() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        let err = s.open(WorkflowId(99)).await.unwrap_err();
        assert!(matches!(err, SessionError::Collaborator(ApiError::Status { status: 404, .. })));
        assert_eq!(s.phase(), Phase::Empty);
        assert!(s.snapshot().is_none());
    }

    #[tokio::test]
    async fn failed_open_keeps_previous_graph() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("Local").unwrap();
        build_pipeline(&s);
        let before = s.snapshot();

        fake.insert_raw(serde_json::json!({
            "id": 5, "name": "Broken",
            "components": [],
            "connections": [{ "id": 1, "source_component_id": "x", "target_component_id": "y",
                              "source_handle": "query", "target_handle": "context" }]
        }));
        let err = s.open(WorkflowId(5)).await.unwrap_err();
        assert!(matches!(err, SessionError::Hydration(_)));
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.snapshot(), before);
        assert_eq!(s.name(), "Local");
    }

    #[tokio::test]
    async fn failed_save_reverts_to_ready() {
        let fake = Arc::new(FakePersistence::default());
        fake.fail_next(ApiError::status(500, "Error updating workflow"));
        let s = session(&fake);
        s.start_new("Flaky").unwrap();
        build_pipeline(&s);
        let err = s.save().await.unwrap_err();
        assert_eq!(err.to_string(), "backend error (500): Error updating workflow");
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.workflow_id(), None);
    }

    #[tokio::test]
    async fn concurrent_save_is_rejected() {
        let fake = Arc::new(FakePersistence::gated());
        let s = session(&fake);
        s.start_new("Busy").unwrap();
        build_pipeline(&s);

        let background = s.clone();
        let first = tokio::spawn(async move { background.save().await });
        while s.phase() != Phase::Saving {
            tokio::task::yield_now().await;
        }

        let err = s.save().await.unwrap_err();
        assert_eq!(err, SessionError::Busy { phase: Phase::Saving });
        assert!(matches!(s.validate().await, Err(SessionError::Validation(_))));

        fake.release();
        first.await.unwrap().unwrap();
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(fake.calls(), vec!["create".to_string()]);
    }

    #[tokio::test]
    async fn dropped_save_restores_phase() {
        let fake = Arc::new(FakePersistence::gated());
        let s = session(&fake);
        s.start_new("Abandoned").unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(20), s.save()).await;
        assert!(outcome.is_err());
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn edits_are_unavailable_without_a_workflow() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        assert!(s.edit(|g| g.add_node(NodeKind::Output, None)).is_none());
        assert!(matches!(s.save().await, Err(SessionError::Validation(_))));
    }

    #[tokio::test]
    async fn create_trims_and_opens_empty_workflow() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        let record = s.create("  Research  ", Some("  ")).await.unwrap();
        assert_eq!(record.name, "Research");
        assert_eq!(record.description, None);
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.workflow_id(), Some(record.id));
        assert!(s.snapshot().unwrap().is_empty());
        assert!(matches!(
            s.create(" ", None).await,
            Err(SessionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn upload_records_file_name_on_success() {
        let fake = Arc::new(FakePersistence::default());
        let uploads = Arc::new(RecordingUploads::default());
        let s = session(&fake).with_uploads(uploads.clone());
        s.start_new("KB").unwrap();
        let kb = s.edit(|g| g.add_node(NodeKind::KnowledgeBase, None)).unwrap();

        let outcome = s
            .upload_document(&kb, PickedFile::new("handbook.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Uploaded { file_name: "handbook.pdf".into() });
        assert_eq!(uploads.uploaded(), vec![(kb.clone(), "handbook.pdf".to_string())]);
        let graph = s.snapshot().unwrap();
        assert_eq!(graph.node(&kb).unwrap().config()["file_name"], json!("handbook.pdf"));
    }

    #[tokio::test]
    async fn upload_failure_still_records_file_name() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake).with_uploads(Arc::new(FailingUploads));
        s.start_new("KB").unwrap();
        let kb = s.edit(|g| g.add_node(NodeKind::KnowledgeBase, None)).unwrap();

        let outcome = s
            .upload_document(&kb, PickedFile::new("notes.txt", "hello"))
            .await
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::Failed { .. }));
        assert_eq!(outcome.file_name(), "notes.txt");
        let graph = s.snapshot().unwrap();
        assert_eq!(graph.node(&kb).unwrap().config()["file_name"], json!("notes.txt"));
    }

    #[tokio::test]
    async fn upload_rejects_non_knowledge_base_nodes() {
        let fake = Arc::new(FakePersistence::default());
        let uploads = Arc::new(RecordingUploads::default());
        let s = session(&fake).with_uploads(uploads.clone());
        s.start_new("KB").unwrap();
        let (q, _) = build_pipeline(&s);
        let picker = StaticPicker(Some(PickedFile::new("a.txt", "a")));
        assert!(matches!(
            s.pick_and_upload(&q, &picker).await,
            Err(SessionError::Validation(_))
        ));
        assert!(uploads.uploaded().is_empty());
    }

    #[tokio::test]
    async fn dismissed_picker_uploads_nothing() {
        let fake = Arc::new(FakePersistence::default());
        let uploads = Arc::new(RecordingUploads::default());
        let s = session(&fake).with_uploads(uploads.clone());
        s.start_new("KB").unwrap();
        let kb = s.edit(|g| g.add_node(NodeKind::KnowledgeBase, None)).unwrap();
        assert_eq!(s.pick_and_upload(&kb, &StaticPicker(None)).await.unwrap(), None);

        let picked = s
            .pick_and_upload(&kb, &StaticPicker(Some(PickedFile::new("faq.docx", "x"))))
            .await
            .unwrap();
        assert_eq!(picked.unwrap().file_name(), "faq.docx");
        assert_eq!(uploads.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn every_kind_survives_save_and_reopen() {
        let fake = Arc::new(FakePersistence::default());
        let s = session(&fake);
        s.start_new("All kinds").unwrap();
        s.edit(|g| {
            for kind in list_kinds() {
                g.add_node(*kind, None);
            }
        });
        let saved = s.save().await.unwrap();
        let reopened = session(&fake);
        reopened.open(saved.id).await.unwrap();
        let kinds: Vec<_> = reopened.snapshot().unwrap().nodes().map(|n| n.kind()).collect();
        assert_eq!(kinds, list_kinds());
    }
}
