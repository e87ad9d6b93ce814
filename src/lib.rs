//! glint — a GLM chat-completions provider adapter with a sandboxed
//! tool-execution runtime.
//!
//! The crate lets a remote model autonomously invoke local capabilities
//! (read/write/edit a file, glob and content search, shell commands) while
//! confined to a bounded project directory, and drives the streaming,
//! multi-turn tool-calling conversation loop against an OpenAI-compatible
//! SSE endpoint.
//!
//! # Example
//!
//! ```no_run
//! use glint::{ExecuteOptions, GlintProvider};
//!
//! # async fn run() {
//! let provider = GlintProvider::from_env();
//! let options = ExecuteOptions::new("list the rust files", "glm-4.5", ".".into());
//! let mut messages = provider.execute_query(options);
//! while let Some(message) = messages.recv().await {
//!     if let Some(text) = message.as_text_delta() {
//!         print!("{text}");
//!     }
//! }
//! # }
//! ```

pub mod api;
pub mod config;
pub mod models;
pub mod sandbox;
pub mod search;
pub mod tools;
pub mod types;

pub use api::{ApiError, GlintProvider};
pub use config::{ConfigReport, InstallationStatus, ProviderConfig, DEFAULT_BASE_URL};
pub use models::{ModelDefinition, DEFAULT_MODEL, MODELS};
pub use types::{ExecuteOptions, Message, Prompt, ProviderMessage, SystemPrompt};
