//! Command line front end for the workflow builder.

mod cli;
mod commands;

use std::process;
use std::time::Duration;

use builder_core::{NodeId, WorkflowId, init_observability};
use builder_http::{ClientConfig, HttpBackend};
use clap::Parser;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_observability();

    if let Err(error) = run(Cli::parse()).await {
        tracing::error!(error = %error, "command failed");
        eprintln!("Error: {error:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config = config.base_url(base_url);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.timeout(Duration::from_millis(ms));
    }
    let backend = HttpBackend::new(config)?;

    match cli.command {
        Command::List => commands::list(&backend).await,
        Command::Show { id } => commands::show(&backend, WorkflowId(id)).await,
        Command::Validate { id } => commands::validate(&backend, WorkflowId(id)).await,
        Command::Export { id, out } => commands::export(&backend, WorkflowId(id), out).await,
        Command::Import { path, name } => commands::import(&backend, &path, name).await,
        Command::New { name, description } => {
            commands::create(&backend, &name, description.as_deref()).await
        }
        Command::Upload { id, node_id, path } => {
            commands::upload(&backend, WorkflowId(id), NodeId::from(node_id), path).await
        }
        Command::Chat {
            id,
            session,
            message,
        } => commands::chat(&backend, WorkflowId(id), session, message).await,
    }
}
