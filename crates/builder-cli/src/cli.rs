use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect, edit and chat with workflows stored on the builder backend.
#[derive(Debug, Parser)]
#[command(name = "builder", version, about)]
pub struct Cli {
    /// Backend base URL. Overrides `BUILDER_API_BASE_URL`.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Request timeout in milliseconds. Overrides `BUILDER_API_TIMEOUT_MS`.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List saved workflows.
    List,
    /// Print a workflow's nodes and edges.
    Show { id: i64 },
    /// Ask the backend to validate a saved workflow.
    Validate { id: i64 },
    /// Write a workflow as a create/update body (JSON).
    Export {
        id: i64,
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Create a workflow from an exported JSON file.
    Import {
        path: PathBuf,
        /// Replace the name stored in the file.
        #[arg(long)]
        name: Option<String>,
    },
    /// Create an empty workflow.
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Upload a document for a knowledge base node.
    Upload {
        id: i64,
        node_id: String,
        path: PathBuf,
    },
    /// Chat with a workflow. Reads messages from stdin unless one is given.
    Chat {
        id: i64,
        /// Resume an existing chat session.
        #[arg(long)]
        session: Option<String>,
        message: Vec<String>,
    },
}
