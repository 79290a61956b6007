use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use builder_core::wire::{WorkflowDraft, WorkflowRecord};
use builder_core::{
    BuilderSession, ChatError, ChatSession, FilePicker, Graph, NodeId, PersistenceApi,
    PickedFile, UploadOutcome, WorkflowId, flatten,
};
use builder_http::HttpBackend;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub async fn list(backend: &HttpBackend) -> anyhow::Result<()> {
    let session = BuilderSession::new(Arc::new(backend.clone()));
    let workflows = session.list().await.context("failed to list workflows")?;
    if workflows.is_empty() {
        println!("No workflows yet.");
    }
    for workflow in &workflows {
        println!("{}", summary_line(workflow));
    }
    Ok(())
}

pub async fn show(backend: &HttpBackend, id: WorkflowId) -> anyhow::Result<()> {
    let session = open(backend, id).await?;
    let graph = session.snapshot().context("workflow did not load")?;
    println!("{} (#{id})", session.name());
    if let Some(description) = session.description() {
        println!("{description}");
    }
    print!("{}", render_graph(&graph));
    Ok(())
}

pub async fn validate(backend: &HttpBackend, id: WorkflowId) -> anyhow::Result<()> {
    let session = open(backend, id).await?;
    let report = session.validate().await?;
    if report.valid {
        println!("Workflow #{id} is valid.");
        Ok(())
    } else {
        bail!(
            "workflow #{id} is invalid: {}",
            report.error.as_deref().unwrap_or("no reason given")
        )
    }
}

pub async fn export(backend: &HttpBackend, id: WorkflowId, out: Option<PathBuf>) -> anyhow::Result<()> {
    let session = open(backend, id).await?;
    let graph = session.snapshot().context("workflow did not load")?;
    let draft = flatten(&graph, &session.name(), session.description().as_deref());
    let json = serde_json::to_string_pretty(&draft)?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(workflow_id = %id, path = %path.display(), "workflow exported");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn import(backend: &HttpBackend, path: &Path, name: Option<String>) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut draft: WorkflowDraft = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not an exported workflow", path.display()))?;
    if let Some(name) = name {
        draft.name = name;
    }
    if draft.name.trim().is_empty() {
        bail!("the imported workflow needs a name (use --name)");
    }
    let record = backend.create(&draft).await.context("failed to create workflow")?;
    // Reopen to make sure the stored record hydrates cleanly.
    let session = open(backend, record.id).await?;
    println!("Imported as {}", summary_line(&record));
    info!(workflow_id = %record.id, nodes = session.snapshot().map_or(0, |g| g.nodes().len()), "workflow imported");
    Ok(())
}

pub async fn create(backend: &HttpBackend, name: &str, description: Option<&str>) -> anyhow::Result<()> {
    let session = BuilderSession::new(Arc::new(backend.clone()));
    let record = session.create(name, description).await?;
    println!("Created {}", summary_line(&record));
    Ok(())
}

pub async fn upload(
    backend: &HttpBackend,
    id: WorkflowId,
    node_id: NodeId,
    path: PathBuf,
) -> anyhow::Result<()> {
    let session = open(backend, id)
        .await?
        .with_uploads(Arc::new(backend.clone()));
    let picker = PathPicker { path };
    match session.pick_and_upload(&node_id, &picker).await? {
        Some(UploadOutcome::Uploaded { file_name }) => println!("Uploaded {file_name}."),
        Some(UploadOutcome::Failed { file_name, message }) => {
            println!("Upload of {file_name} failed: {message}");
        }
        None => bail!("no file to upload"),
    }
    // The file name is recorded on the node either way; persist it.
    session.save().await.context("failed to save workflow")?;
    Ok(())
}

pub async fn chat(
    backend: &HttpBackend,
    id: WorkflowId,
    session_id: Option<String>,
    message: Vec<String>,
) -> anyhow::Result<()> {
    let api = Arc::new(backend.clone());
    let chat = match session_id {
        Some(session_id) => {
            let chat = ChatSession::with_session_id(api, Some(id), session_id);
            for past in chat.history().await.unwrap_or_default() {
                println!("{}: {}", past.role, past.message);
            }
            chat
        }
        None => ChatSession::new(api, Some(id)),
    };
    info!(workflow_id = %id, session_id = %chat.session_id(), "chat session started");

    if !message.is_empty() {
        reply(&chat, &message.join(" ")).await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        reply(&chat, line).await;
    }
    Ok(())
}

async fn reply(chat: &ChatSession, text: &str) {
    match chat.send(text).await {
        Ok(message) => println!("assistant: {}", message.message),
        Err(ChatError::EmptyMessage) => {}
        Err(err) => {
            warn!(error = %err, "chat message failed");
            println!("assistant: {}", err.notice());
        }
    }
}

async fn open(backend: &HttpBackend, id: WorkflowId) -> anyhow::Result<BuilderSession> {
    let session = BuilderSession::new(Arc::new(backend.clone()));
    session
        .open(id)
        .await
        .with_context(|| format!("failed to open workflow #{id}"))?;
    Ok(session)
}

/// Serves a file from disk in place of an interactive picker.
struct PathPicker {
    path: PathBuf,
}

#[async_trait]
impl FilePicker for PathPicker {
    async fn pick(&self, _node_id: &NodeId) -> Option<PickedFile> {
        let name = self.path.file_name()?.to_string_lossy().into_owned();
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(PickedFile::new(name, bytes)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read file");
                None
            }
        }
    }
}

fn summary_line(workflow: &WorkflowRecord) -> String {
    format!(
        "#{:<4} {} ({} components, {} connections)",
        workflow.id.0,
        workflow.name,
        workflow.components.len(),
        workflow.connections.len()
    )
}

fn render_graph(graph: &Graph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "nodes:");
    for node in graph.nodes() {
        let position = node.position();
        let _ = writeln!(
            out,
            "  {:<14} {} at ({:.0}, {:.0})",
            node.label(),
            node.id(),
            position.x,
            position.y
        );
    }
    let _ = writeln!(out, "edges:");
    for edge in graph.edges() {
        let _ = writeln!(
            out,
            "  {}.{} -> {}.{}",
            edge.source, edge.source_port, edge.target, edge.target_port
        );
    }
    out
}
