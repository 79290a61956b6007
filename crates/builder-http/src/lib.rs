//! HTTP implementations of the builder's collaborator contracts.

mod client;
mod config;

pub use client::HttpBackend;
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
