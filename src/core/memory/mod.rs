//! Facts remembered across runs, and the nodes that move them in and out of prompts.

pub mod in_memory;
pub mod nodes;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::AgentError;

pub use in_memory::InMemoryMemoryProvider;
pub use nodes::{node_load_from_memory, node_save_facts_from_history, node_save_to_memory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Single,
    Multiple,
}

/// A kind of knowledge, identified by its keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Concept {
    pub keyword: String,
    pub description: String,
    pub fact_type: FactType,
}

impl Concept {
    pub fn new(keyword: impl Into<String>, description: impl Into<String>, fact_type: FactType) -> Self {
        Self {
            keyword: keyword.into(),
            description: description.into(),
            fact_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FactValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            FactValue::Single(value) => vec![value.as_str()],
            FactValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// One remembered piece of knowledge about a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub concept: Concept,
    pub timestamp: DateTime<Utc>,
    pub value: FactValue,
}

impl Fact {
    pub fn single(concept: Concept, value: impl Into<String>) -> Self {
        Self {
            concept,
            timestamp: Utc::now(),
            value: FactValue::Single(value.into()),
        }
    }

    pub fn multiple(concept: Concept, values: Vec<String>) -> Self {
        Self {
            concept,
            timestamp: Utc::now(),
            value: FactValue::Multiple(values),
        }
    }
}

/// Visibility of a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "name", rename_all = "snake_case")]
pub enum MemoryScope {
    /// Only the named agent sees it.
    Agent(String),
    /// Shared by agents using the named feature.
    Feature(String),
    /// Shared within the named product.
    Product(String),
    CrossProduct,
}

/// Who or what a fact is about, e.g. `user` or `project`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemorySubject(pub String);

impl MemorySubject {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for MemorySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for facts.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    async fn save(
        &self,
        fact: Fact,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<(), AgentError>;

    /// Facts about `concept`, oldest first.
    async fn load(
        &self,
        concept: &Concept,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError>;

    async fn load_all(
        &self,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError>;

    /// Facts whose concept matches a free-text description.
    async fn load_by_description(
        &self,
        description: &str,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError>;
}
