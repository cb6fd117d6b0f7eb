use thiserror::Error;

use crate::core::agent::message::AgentServiceError;
use crate::core::validation::ValidationIssue;
use crate::core::value::ValueKind;
use crate::llm::LLMError;

/// Errors raised while building a strategy graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Strategy '{strategy}' failed validation: {issues:?}")]
    Validation {
        strategy: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Node '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("Node name '{0}' is reserved")]
    ReservedName(String),
}

/// Errors raised while building a tool registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stage '{0}' declares no tools")]
    EmptyStage(String),

    #[error("Tool '{tool}' is declared more than once in stage '{stage}'")]
    DuplicateTool { stage: String, tool: String },

    #[error("Stage '{0}' is declared more than once")]
    DuplicateStage(String),
}

/// Failures reported by a tool implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The arguments or preconditions were rejected by the tool.
    #[error("{0}")]
    Validation(String),

    /// The tool failed while running.
    #[error("{0}")]
    Execution(String),
}

/// A failure inside an [`AgentFeature`](crate::core::feature::AgentFeature) hook.
///
/// These are logged by the pipeline and never reach the run.
#[derive(Debug, Error)]
#[error("Feature '{feature}' failed: {message}")]
pub struct FeatureError {
    pub feature: String,
    pub message: String,
}

impl FeatureError {
    pub fn new(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            message: message.into(),
        }
    }
}

/// The crate-wide error type.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Node '{node}' produced a {kind} output that no outgoing edge accepts")]
    UnhandledOutput { node: String, kind: ValueKind },

    #[error("Node '{node}' expected a {expected} input but received {actual}")]
    UnexpectedInput {
        node: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Node '{node}' failed: {message}")]
    Node { node: String, message: String },

    #[error("Agent exceeded max iterations ({0})")]
    MaxIterationsReached(usize),

    #[error("LLM session is closed; sessions cannot be used outside their block")]
    SessionClosed,

    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Agent service error: {0}")]
    Service(AgentServiceError),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Structured output could not be parsed after {attempts} attempt(s): {message}")]
    StructuredOutput { attempts: usize, message: String },

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Convenience for node implementations reporting their own failures.
    pub fn node(node: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Node {
            node: node.into(),
            message: message.into(),
        }
    }
}
