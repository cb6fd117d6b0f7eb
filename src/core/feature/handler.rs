use std::sync::Arc;

use async_trait::async_trait;

use super::AgentFeature;
use super::events::*;
use crate::core::error::FeatureError;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A feature built from plain closures, for callers that only want to observe
/// a handful of events.
///
/// ```rust
/// use stratagem::prelude::*;
///
/// let handler = EventHandler::new()
///     .on_tool_call(|event| log::info!("calling {}", event.tool_name))
///     .on_agent_finished(|event| log::info!("result: {:?}", event.result));
/// ```
#[derive(Clone, Default)]
pub struct EventHandler {
    agent_started: Vec<Callback<AgentStartedEvent>>,
    agent_finished: Vec<Callback<AgentFinishedEvent>>,
    agent_run_error: Vec<Callback<AgentRunErrorEvent>>,
    strategy_started: Vec<Callback<StrategyStartedEvent>>,
    strategy_finished: Vec<Callback<StrategyFinishedEvent>>,
    before_node: Vec<Callback<BeforeNodeEvent>>,
    after_node: Vec<Callback<AfterNodeEvent>>,
    before_llm_call: Vec<Callback<BeforeLLMCallEvent>>,
    after_llm_call: Vec<Callback<AfterLLMCallEvent>>,
    tool_call: Vec<Callback<ToolCallEvent>>,
    tool_validation_error: Vec<Callback<ToolValidationErrorEvent>>,
    tool_call_failure: Vec<Callback<ToolCallFailureEvent>>,
    tool_call_result: Vec<Callback<ToolCallResultEvent>>,
}

macro_rules! callback_setter {
    ($setter:ident, $field:ident, $event:ty) => {
        pub fn $setter(mut self, callback: impl Fn(&$event) + Send + Sync + 'static) -> Self {
            self.$field.push(Arc::new(callback));
            self
        }
    };
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    callback_setter!(on_agent_started, agent_started, AgentStartedEvent);
    callback_setter!(on_agent_finished, agent_finished, AgentFinishedEvent);
    callback_setter!(on_agent_run_error, agent_run_error, AgentRunErrorEvent);
    callback_setter!(on_strategy_started, strategy_started, StrategyStartedEvent);
    callback_setter!(on_strategy_finished, strategy_finished, StrategyFinishedEvent);
    callback_setter!(on_before_node, before_node, BeforeNodeEvent);
    callback_setter!(on_after_node, after_node, AfterNodeEvent);
    callback_setter!(on_before_llm_call, before_llm_call, BeforeLLMCallEvent);
    callback_setter!(on_after_llm_call, after_llm_call, AfterLLMCallEvent);
    callback_setter!(on_tool_call, tool_call, ToolCallEvent);
    callback_setter!(on_tool_validation_error, tool_validation_error, ToolValidationErrorEvent);
    callback_setter!(on_tool_call_failure, tool_call_failure, ToolCallFailureEvent);
    callback_setter!(on_tool_call_result, tool_call_result, ToolCallResultEvent);
}

fn fire<E>(callbacks: &[Callback<E>], event: &E) -> Result<(), FeatureError> {
    for callback in callbacks {
        callback(event);
    }
    Ok(())
}

#[async_trait]
impl AgentFeature for EventHandler {
    fn name(&self) -> &str {
        "event_handler"
    }

    async fn on_agent_started(&self, event: &AgentStartedEvent) -> Result<(), FeatureError> {
        fire(&self.agent_started, event)
    }

    async fn on_agent_finished(&self, event: &AgentFinishedEvent) -> Result<(), FeatureError> {
        fire(&self.agent_finished, event)
    }

    async fn on_agent_run_error(&self, event: &AgentRunErrorEvent) -> Result<(), FeatureError> {
        fire(&self.agent_run_error, event)
    }

    async fn on_strategy_started(&self, event: &StrategyStartedEvent) -> Result<(), FeatureError> {
        fire(&self.strategy_started, event)
    }

    async fn on_strategy_finished(
        &self,
        event: &StrategyFinishedEvent,
    ) -> Result<(), FeatureError> {
        fire(&self.strategy_finished, event)
    }

    async fn on_before_node(&self, event: &BeforeNodeEvent) -> Result<(), FeatureError> {
        fire(&self.before_node, event)
    }

    async fn on_after_node(&self, event: &AfterNodeEvent) -> Result<(), FeatureError> {
        fire(&self.after_node, event)
    }

    async fn on_before_llm_call(&self, event: &BeforeLLMCallEvent) -> Result<(), FeatureError> {
        fire(&self.before_llm_call, event)
    }

    async fn on_after_llm_call(&self, event: &AfterLLMCallEvent) -> Result<(), FeatureError> {
        fire(&self.after_llm_call, event)
    }

    async fn on_tool_call(&self, event: &ToolCallEvent) -> Result<(), FeatureError> {
        fire(&self.tool_call, event)
    }

    async fn on_tool_validation_error(
        &self,
        event: &ToolValidationErrorEvent,
    ) -> Result<(), FeatureError> {
        fire(&self.tool_validation_error, event)
    }

    async fn on_tool_call_failure(&self, event: &ToolCallFailureEvent) -> Result<(), FeatureError> {
        fire(&self.tool_call_failure, event)
    }

    async fn on_tool_call_result(&self, event: &ToolCallResultEvent) -> Result<(), FeatureError> {
        fire(&self.tool_call_result, event)
    }
}
