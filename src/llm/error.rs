use thiserror::Error;

/// Failures talking to a model provider.
#[derive(Debug, Error)]
pub enum LLMError {
    #[cfg(feature = "llm")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error reported by the Ollama server itself, in a reply or mid-stream.
    #[error("Ollama error: {0}")]
    OllamaError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider returned no response messages")]
    EmptyResponse,

    #[error("Operation not supported by {provider}: {operation}")]
    Unsupported { provider: String, operation: String },
}
