use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use super::dispatch::{RunEnvironment, RunPhase};
use super::environment::{AgentEnvironment, ErrorHandler};
use crate::core::config::AgentConfig;
use crate::core::context::AgentContext;
use crate::core::error::AgentError;
use crate::core::feature::events::*;
use crate::core::feature::{AgentFeature, FeaturePipeline};
use crate::core::graph::Strategy;
use crate::core::session::LLMContext;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::registry::ToolRegistry;
use crate::core::value::NodeValue;
use crate::llm::LLMClient;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunOutcome {
    pub run_id: Uuid,
    /// `None` when the run ended through a handled error or with a unit value.
    pub result: Option<String>,
}

/// Marks the agent busy for the lifetime of a run.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, AgentError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AgentError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An agent: one strategy, one model client, one tool registry.
///
/// An agent serves one run at a time; starting a second run while the first
/// is in flight fails with [`AgentError::AlreadyRunning`]. Create several
/// agents to run concurrently.
pub struct AIAgent {
    id: String,
    strategy: Strategy,
    config: Arc<AgentConfig>,
    client: Arc<dyn LLMClient>,
    registry: Arc<ToolRegistry>,
    pipeline: Arc<FeaturePipeline>,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
    running: AtomicBool,
}

impl AIAgent {
    pub fn builder(client: Arc<dyn LLMClient>, strategy: Strategy) -> AIAgentBuilder {
        AIAgentBuilder::new(client, strategy)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Tools offered to the model: the strategy's stage, or every registered tool.
    fn offered_tools(&self) -> Vec<ToolDescriptor> {
        match self.strategy.tool_stage() {
            Some(stage) => self
                .registry
                .stage_by_name(stage)
                .map(|s| s.descriptors())
                .unwrap_or_default(),
            None => self.registry.descriptors(),
        }
    }

    /// Runs the strategy on `input` and waits for the final result.
    pub async fn run(&self, input: impl Into<String>) -> Result<AgentRunOutcome, AgentError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let input = input.into();
        let run_id = Uuid::new_v4();
        let strategy_name = self.strategy.name().to_string();
        log::info!("Agent '{}' starting run {}", self.id, run_id);

        self.pipeline
            .on_agent_started(AgentStartedEvent {
                agent_id: self.id.clone(),
                run_id,
                strategy_name: strategy_name.clone(),
                input: input.clone(),
            })
            .await;

        let (environment, result_rx) = RunEnvironment::new(
            run_id,
            Arc::clone(&self.registry),
            Arc::clone(&self.pipeline),
            self.error_handlers.clone(),
        );
        let environment = Arc::new(environment);
        let llm = LLMContext::new(
            run_id,
            Arc::clone(&self.client),
            Arc::clone(&self.registry),
            Arc::clone(&self.pipeline),
            self.config.prompt.clone(),
            self.offered_tools(),
            self.config.model.clone(),
        );
        let ctx = AgentContext::new(
            self.id.clone(),
            llm,
            environment.clone(),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.config),
        );

        let delivered = match self.strategy.execute(&ctx, NodeValue::Text(input)).await {
            Ok(output) => {
                // A node may already have terminated the run through the environment.
                if environment.phase().await == RunPhase::Terminated {
                    Ok(())
                } else {
                    environment
                        .send_termination_message(output.into_result_string())
                        .await
                }
            }
            Err(e) => environment.report_problem(e).await,
        };

        let outcome = match delivered {
            Ok(()) => result_rx.await.map_err(|_| {
                AgentError::Precondition(format!("run {} ended without a result", run_id))
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                log::info!("Agent '{}' finished run {}", self.id, run_id);
                self.pipeline
                    .on_agent_finished(AgentFinishedEvent {
                        agent_id: self.id.clone(),
                        run_id,
                        strategy_name,
                        result: result.clone(),
                    })
                    .await;
                Ok(AgentRunOutcome { run_id, result })
            }
            Err(e) => {
                log::error!("Agent '{}' run {} failed: {}", self.id, run_id, e);
                self.pipeline
                    .on_agent_run_error(AgentRunErrorEvent {
                        agent_id: self.id.clone(),
                        run_id,
                        strategy_name,
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// [`run`](Self::run), keeping only the result.
    pub async fn run_and_get_result(
        &self,
        input: impl Into<String>,
    ) -> Result<Option<String>, AgentError> {
        Ok(self.run(input).await?.result)
    }
}

/// Collects what an [`AIAgent`] needs and validates it.
pub struct AIAgentBuilder {
    id: Option<String>,
    strategy: Strategy,
    client: Arc<dyn LLMClient>,
    config: AgentConfig,
    registry: ToolRegistry,
    pipeline: FeaturePipeline,
    error_handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl AIAgentBuilder {
    fn new(client: Arc<dyn LLMClient>, strategy: Strategy) -> Self {
        Self {
            id: None,
            strategy,
            client,
            config: AgentConfig::default(),
            registry: ToolRegistry::empty(),
            pipeline: FeaturePipeline::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tool_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_feature(mut self, feature: Arc<dyn AgentFeature>) -> Self {
        self.pipeline.install(feature);
        self
    }

    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handlers.push(Arc::new(handler));
        self
    }

    /// Checks the configuration and fires the agent-created hook.
    pub async fn build(self) -> Result<AIAgent, AgentError> {
        if let Some(stage) = self.strategy.tool_stage() {
            if self.registry.stage_by_name(stage).is_none() {
                return Err(AgentError::Config(format!(
                    "strategy '{}' uses tool stage '{}' which is not registered",
                    self.strategy.name(),
                    stage
                )));
            }
        }
        if self.config.max_agent_iterations == 0 {
            return Err(AgentError::Config(
                "max_agent_iterations must be greater than 0".to_string(),
            ));
        }

        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let pipeline = Arc::new(self.pipeline);
        pipeline
            .on_agent_created(AgentCreatedEvent {
                agent_id: id.clone(),
                strategy_name: self.strategy.name().to_string(),
            })
            .await;
        log::debug!("Agent '{}' created with strategy '{}'", id, self.strategy.name());

        Ok(AIAgent {
            id,
            strategy: self.strategy,
            config: Arc::new(self.config),
            client: self.client,
            registry: Arc::new(self.registry),
            pipeline,
            error_handlers: self.error_handlers,
            running: AtomicBool::new(false),
        })
    }
}
