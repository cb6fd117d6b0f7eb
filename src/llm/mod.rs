//! LLM provider interface for Stratagem
//!
//! The graph engine only talks to providers through [`LLMClient`]. Concrete HTTP
//! adapters live behind the `llm` feature so the core stays dependency-light.

pub mod error;

#[cfg(feature = "llm")]
pub mod ollama;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::prompt::{Message, Prompt};
use crate::core::tools::descriptor::ToolDescriptor;

pub use error::LLMError;
#[cfg(feature = "llm")]
pub use ollama::{OllamaClient, OllamaConfig};

/// Stream of text chunks produced by a streaming completion.
pub type TextStream = BoxStream<'static, Result<String, LLMError>>;

/// The provider family a model belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    Google,
    Ollama,
    Bedrock,
    OpenRouter,
    Custom(String),
}

impl fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Google => write!(f, "google"),
            LLMProvider::Ollama => write!(f, "ollama"),
            LLMProvider::Bedrock => write!(f, "bedrock"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A concrete model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LLModel {
    pub provider: LLMProvider,
    pub id: String,
}

impl LLModel {
    pub fn new(provider: LLMProvider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }

    /// Shorthand for a locally served Ollama model.
    pub fn ollama(id: impl Into<String>) -> Self {
        Self::new(LLMProvider::Ollama, id)
    }
}

impl fmt::Display for LLModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// Client for a single LLM provider.
///
/// The engine requires that a successful [`execute`](LLMClient::execute) returns
/// at least one message, each being either an assistant text or a tool call.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Runs the prompt against `model`, exposing `tools` to it.
    async fn execute(
        &self,
        prompt: &Prompt,
        model: &LLModel,
        tools: &[ToolDescriptor],
    ) -> Result<Vec<Message>, LLMError>;

    /// Streams the completion as text chunks. Tools are not offered.
    async fn execute_streaming(
        &self,
        prompt: &Prompt,
        model: &LLModel,
    ) -> Result<TextStream, LLMError>;

    /// Computes an embedding vector for `text`.
    async fn embed(&self, _text: &str, model: &LLModel) -> Result<Vec<f64>, LLMError> {
        Err(LLMError::Unsupported {
            provider: model.provider.to_string(),
            operation: "embed".to_string(),
        })
    }
}
