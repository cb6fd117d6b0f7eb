use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::agent::environment::AgentEnvironment;
use crate::core::config::AgentConfig;
use crate::core::error::AgentError;
use crate::core::feature::FeaturePipeline;
use crate::core::session::LLMContext;

/// Key/value scratch space shared by the nodes of one run.
#[derive(Clone, Default)]
pub struct AgentStorage {
    values: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl AgentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), AgentError> {
        let value = serde_json::to_value(value)?;
        self.values.write().await.insert(key.into(), value);
        Ok(())
    }

    /// Returns `Ok(None)` when the key is absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AgentError> {
        match self.values.read().await.get(key) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.values.write().await.remove(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }
}

/// Everything a node can reach during a run.
///
/// Cloning is cheap; clones share the LLM context, storage and iteration budget.
#[derive(Clone)]
pub struct AgentContext {
    run_id: Uuid,
    agent_id: String,
    llm: LLMContext,
    environment: Arc<dyn AgentEnvironment>,
    pipeline: Arc<FeaturePipeline>,
    config: Arc<AgentConfig>,
    storage: AgentStorage,
    iterations: Arc<AtomicUsize>,
}

impl AgentContext {
    pub fn new(
        agent_id: impl Into<String>,
        llm: LLMContext,
        environment: Arc<dyn AgentEnvironment>,
        pipeline: Arc<FeaturePipeline>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            run_id: llm.run_id(),
            agent_id: agent_id.into(),
            llm,
            environment,
            pipeline,
            config,
            storage: AgentStorage::new(),
            iterations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn llm(&self) -> &LLMContext {
        &self.llm
    }

    pub fn environment(&self) -> &Arc<dyn AgentEnvironment> {
        &self.environment
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn storage(&self) -> &AgentStorage {
        &self.storage
    }

    /// Node executions performed so far in this run.
    pub fn iterations(&self) -> usize {
        self.iterations.load(Ordering::SeqCst)
    }

    /// Consumes one unit of the iteration budget.
    pub(crate) fn tick(&self) -> Result<(), AgentError> {
        let max = self.config.max_agent_iterations;
        let done = self.iterations.fetch_add(1, Ordering::SeqCst);
        if done >= max {
            log::error!("Run {} exceeded the budget of {} node executions", self.run_id, max);
            return Err(AgentError::MaxIterationsReached(max));
        }
        Ok(())
    }
}
