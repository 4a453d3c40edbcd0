//! Completion-service boundary.
//!
//! The assistant only needs one operation from a language model: turn a
//! persona instruction plus an assembled prompt into reply text. The
//! `LlmProvider` trait captures that, and `OllamaProvider` implements it
//! against a local Ollama instance.

pub mod ollama;
pub mod provider;

pub use ollama::OllamaProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::AssistantConfig;

/// Create the completion provider described by the configuration.
pub fn create_provider(config: &AssistantConfig) -> Arc<dyn LlmProvider> {
    tracing::info!("Using Ollama at {} (model: {})", config.ollama_url, config.model);
    Arc::new(
        OllamaProvider::new(&config.ollama_url, &config.model).with_api_key(config.api_key.clone()),
    )
}
