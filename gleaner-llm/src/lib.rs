//! Provider-agnostic LLM integration for Gleaner.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and the Ollama
//! implementation. [`build_llm_client`] initialises a client from a
//! [`gleaner_common::LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use gleaner_common::LlmConfig;
//! use gleaner_llm::build_llm_client;
//! use gleaner_llm::traits::LlmClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), gleaner_common::ModelError> {
//! let client = build_llm_client(&LlmConfig::default()).await?;
//! assert_eq!(client.model_name(), "llama3");
//! # Ok(())
//! # }
//! ```
pub mod ollama;
pub mod traits;

use gleaner_common::{LlmConfig, ModelError};
use ollama::OllamaClient;
use std::sync::Arc;
use traits::LlmClient;

/// Build a ready-to-use client (server reachable, model present).
pub async fn build_llm_client(
    config: &LlmConfig,
) -> Result<Arc<dyn LlmClient + Send + Sync + 'static>, ModelError> {
    match config {
        LlmConfig::Ollama {
            model,
            endpoint,
            pull_missing,
        } => {
            let client = OllamaClient::connect(endpoint.clone(), model.clone(), *pull_missing).await?;
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(ModelError::Config("No LLM configured".to_string())),
    }
}
