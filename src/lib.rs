//! parley: streaming chat orchestration with tool calling.
//!
//! Drives a multi-turn conversation against an Ollama-style chat backend,
//! throttles the token stream for observers, detects tool calls in the
//! model's output, runs them, and resumes generation with the results.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = ParleyConfig::load()?;
//! let handle = Orchestrator::spawn(OrchestratorDeps {
//!     backend: Arc::new(OllamaBackend::from_config(&config)),
//!     storage: Arc::new(MemoryStorage::new()),
//!     registry: Arc::new(ToolRegistry::builtin(&config)),
//!     config,
//!     event_sink: None,
//! });
//! handle.send_prompt(PromptRequest::new("What time is it in UTC?", "llama3.2")).await?;
//! let snapshot = handle.wait_for_idle().await;
//! if let Some(reply) = snapshot.last_reply() {
//!     println!("{}", reply.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod storage;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
