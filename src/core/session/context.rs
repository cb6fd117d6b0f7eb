use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::read::LLMReadSession;
use super::write::LLMWriteSession;
use crate::core::error::AgentError;
use crate::core::feature::FeaturePipeline;
use crate::core::prompt::Prompt;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::registry::ToolRegistry;
use crate::llm::{LLMClient, LLModel};

/// The committed baseline a session starts from.
#[derive(Debug, Clone)]
pub(crate) struct LLMState {
    pub(crate) prompt: Prompt,
    pub(crate) tools: Vec<ToolDescriptor>,
    pub(crate) model: LLModel,
}

/// Collaborators a write session calls into.
pub(crate) struct SessionServices {
    pub(crate) run_id: Uuid,
    pub(crate) client: Arc<dyn LLMClient>,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) pipeline: Arc<FeaturePipeline>,
}

/// Prompt, tools and model of one run, guarded by a single read/write lock.
#[derive(Clone)]
pub struct LLMContext {
    state: Arc<RwLock<LLMState>>,
    services: Arc<SessionServices>,
}

impl LLMContext {
    pub fn new(
        run_id: Uuid,
        client: Arc<dyn LLMClient>,
        registry: Arc<ToolRegistry>,
        pipeline: Arc<FeaturePipeline>,
        prompt: Prompt,
        tools: Vec<ToolDescriptor>,
        model: LLModel,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(LLMState {
                prompt,
                tools,
                model,
            })),
            services: Arc::new(SessionServices {
                run_id,
                client,
                registry,
                pipeline,
            }),
        }
    }

    /// Runs `block` with exclusive access to the prompt.
    ///
    /// Changes made through the session become the new baseline only if the
    /// block returns `Ok`. The session is closed on every exit path.
    ///
    /// ```rust,no_run
    /// # use stratagem::prelude::*;
    /// # async fn demo(llm: LLMContext) -> Result<(), AgentError> {
    /// let reply = llm
    ///     .write_session(|session| {
    ///         Box::pin(async move {
    ///             session.update_prompt(|p| {
    ///                 p.user("What is 2 + 2?");
    ///             })?;
    ///             session.request_llm_without_tools().await
    ///         })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn write_session<R, F>(&self, block: F) -> Result<R, AgentError>
    where
        F: for<'s> FnOnce(&'s mut LLMWriteSession) -> BoxFuture<'s, Result<R, AgentError>>,
    {
        let mut guard = self.state.write().await;
        let mut session = LLMWriteSession::new(guard.clone(), Arc::clone(&self.services));
        let outcome = block(&mut session).await;
        let state = session.close();
        if outcome.is_ok() {
            *guard = state;
        }
        outcome
    }

    /// Runs `block` with shared, read-only access to the committed baseline.
    pub async fn read_session<R, F>(&self, block: F) -> R
    where
        F: for<'s> FnOnce(&'s LLMReadSession) -> BoxFuture<'s, R>,
    {
        let guard = self.state.read().await;
        let session = LLMReadSession::new(guard.clone());
        let result = block(&session).await;
        session.close();
        drop(guard);
        result
    }

    /// Snapshot of the committed prompt.
    pub async fn prompt(&self) -> Prompt {
        self.state.read().await.prompt.clone()
    }

    /// Snapshot of the committed tool list.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.state.read().await.tools.clone()
    }

    pub async fn model(&self) -> LLModel {
        self.state.read().await.model.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.services.run_id
    }

    pub fn client(&self) -> Arc<dyn LLMClient> {
        Arc::clone(&self.services.client)
    }
}
