//! Language-model boundary.
//!
//! The engine only needs text in, text out. Output is untrusted: callers parse
//! it best-effort and never retry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ModelError;
use crate::types::{ModelConfig, ModelProvider};

pub mod claude;
pub mod gemini;
pub mod prompts;

pub use claude::ClaudeCliModel;
pub use gemini::GeminiModel;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Build the adapter named in the config.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>, ModelError> {
    match config.provider {
        ModelProvider::ClaudeCli => Ok(Arc::new(ClaudeCliModel::new(config.timeout_secs))),
        ModelProvider::Gemini => {
            let api_key = std::env::var(&config.api_key_env)
                .map_err(|_| ModelError::MissingApiKey(config.api_key_env.clone()))?;
            Ok(Arc::new(GeminiModel::new(api_key, config.model.clone())))
        }
    }
}
