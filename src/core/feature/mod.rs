//! Cross-cutting features observing the agent lifecycle.
//!
//! A feature implements [`AgentFeature`] and overrides the hooks it cares about.
//! The [`FeaturePipeline`] calls every installed feature in registration order.
//! Hooks observe; they cannot steer the run. A hook returning an error or
//! panicking is logged and the run continues.

pub mod events;
pub mod handler;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::core::error::FeatureError;
use events::*;

type HookResult = Result<(), FeatureError>;

#[async_trait]
pub trait AgentFeature: Send + Sync {
    /// Name used in logs when a hook fails.
    fn name(&self) -> &str;

    async fn on_agent_created(&self, _event: &AgentCreatedEvent) -> HookResult {
        Ok(())
    }

    async fn on_agent_started(&self, _event: &AgentStartedEvent) -> HookResult {
        Ok(())
    }

    async fn on_agent_finished(&self, _event: &AgentFinishedEvent) -> HookResult {
        Ok(())
    }

    async fn on_agent_run_error(&self, _event: &AgentRunErrorEvent) -> HookResult {
        Ok(())
    }

    async fn on_strategy_started(&self, _event: &StrategyStartedEvent) -> HookResult {
        Ok(())
    }

    async fn on_strategy_finished(&self, _event: &StrategyFinishedEvent) -> HookResult {
        Ok(())
    }

    async fn on_before_node(&self, _event: &BeforeNodeEvent) -> HookResult {
        Ok(())
    }

    async fn on_after_node(&self, _event: &AfterNodeEvent) -> HookResult {
        Ok(())
    }

    async fn on_node_error(&self, _event: &NodeErrorEvent) -> HookResult {
        Ok(())
    }

    async fn on_before_llm_call(&self, _event: &BeforeLLMCallEvent) -> HookResult {
        Ok(())
    }

    async fn on_after_llm_call(&self, _event: &AfterLLMCallEvent) -> HookResult {
        Ok(())
    }

    async fn on_tool_call(&self, _event: &ToolCallEvent) -> HookResult {
        Ok(())
    }

    async fn on_tool_validation_error(&self, _event: &ToolValidationErrorEvent) -> HookResult {
        Ok(())
    }

    async fn on_tool_call_failure(&self, _event: &ToolCallFailureEvent) -> HookResult {
        Ok(())
    }

    async fn on_tool_call_result(&self, _event: &ToolCallResultEvent) -> HookResult {
        Ok(())
    }
}

/// Calls `$call` on every feature, isolating each call behind its own error
/// and panic boundary.
macro_rules! notify {
    ($pipeline:expr, $hook:literal, |$feature:ident| $call:expr) => {
        for $feature in $pipeline.features.iter() {
            match AssertUnwindSafe($call).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Feature '{}' failed in {}: {}", $feature.name(), $hook, e)
                }
                Err(_) => log::error!("Feature '{}' panicked in {}", $feature.name(), $hook),
            }
        }
    };
}

/// The ordered set of installed features.
#[derive(Clone, Default)]
pub struct FeaturePipeline {
    features: Vec<Arc<dyn AgentFeature>>,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, feature: Arc<dyn AgentFeature>) {
        log::debug!("Installing feature '{}'", feature.name());
        self.features.push(feature);
    }

    pub fn with_feature(mut self, feature: Arc<dyn AgentFeature>) -> Self {
        self.install(feature);
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub async fn on_agent_created(&self, event: AgentCreatedEvent) {
        notify!(self, "on_agent_created", |f| f.on_agent_created(&event));
    }

    pub async fn on_agent_started(&self, event: AgentStartedEvent) {
        notify!(self, "on_agent_started", |f| f.on_agent_started(&event));
    }

    pub async fn on_agent_finished(&self, event: AgentFinishedEvent) {
        notify!(self, "on_agent_finished", |f| f.on_agent_finished(&event));
    }

    pub async fn on_agent_run_error(&self, event: AgentRunErrorEvent) {
        notify!(self, "on_agent_run_error", |f| f.on_agent_run_error(&event));
    }

    pub async fn on_strategy_started(&self, event: StrategyStartedEvent) {
        notify!(self, "on_strategy_started", |f| f.on_strategy_started(&event));
    }

    pub async fn on_strategy_finished(&self, event: StrategyFinishedEvent) {
        notify!(self, "on_strategy_finished", |f| f.on_strategy_finished(&event));
    }

    pub async fn on_before_node(&self, event: BeforeNodeEvent) {
        notify!(self, "on_before_node", |f| f.on_before_node(&event));
    }

    pub async fn on_after_node(&self, event: AfterNodeEvent) {
        notify!(self, "on_after_node", |f| f.on_after_node(&event));
    }

    pub async fn on_node_error(&self, event: NodeErrorEvent) {
        notify!(self, "on_node_error", |f| f.on_node_error(&event));
    }

    pub async fn on_before_llm_call(&self, event: BeforeLLMCallEvent) {
        notify!(self, "on_before_llm_call", |f| f.on_before_llm_call(&event));
    }

    pub async fn on_after_llm_call(&self, event: AfterLLMCallEvent) {
        notify!(self, "on_after_llm_call", |f| f.on_after_llm_call(&event));
    }

    pub async fn on_tool_call(&self, event: ToolCallEvent) {
        notify!(self, "on_tool_call", |f| f.on_tool_call(&event));
    }

    pub async fn on_tool_validation_error(&self, event: ToolValidationErrorEvent) {
        notify!(self, "on_tool_validation_error", |f| f
            .on_tool_validation_error(&event));
    }

    pub async fn on_tool_call_failure(&self, event: ToolCallFailureEvent) {
        notify!(self, "on_tool_call_failure", |f| f.on_tool_call_failure(&event));
    }

    pub async fn on_tool_call_result(&self, event: ToolCallResultEvent) {
        notify!(self, "on_tool_call_result", |f| f.on_tool_call_result(&event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Failing;

    #[async_trait]
    impl AgentFeature for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn on_tool_call(&self, _event: &ToolCallEvent) -> HookResult {
            Err(FeatureError::new("failing", "boom"))
        }

        async fn on_before_node(&self, _event: &BeforeNodeEvent) -> HookResult {
            panic!("hook panic");
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl AgentFeature for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn on_tool_call(&self, _event: &ToolCallEvent) -> HookResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_before_node(&self, _event: &BeforeNodeEvent) -> HookResult {
            self.0.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_hooks_do_not_stop_later_features() {
        let counting = Arc::new(Counting::default());
        let pipeline = FeaturePipeline::new()
            .with_feature(Arc::new(Failing))
            .with_feature(counting.clone());

        pipeline
            .on_tool_call(ToolCallEvent {
                run_id: Uuid::new_v4(),
                tool_call_id: None,
                tool_name: "plus".into(),
                tool_args: serde_json::json!({}),
            })
            .await;
        pipeline
            .on_before_node(BeforeNodeEvent {
                run_id: Uuid::new_v4(),
                node_name: "n".into(),
                input: crate::core::value::NodeValue::Unit,
            })
            .await;

        assert_eq!(counting.0.load(Ordering::SeqCst), 11);
        assert_eq!(pipeline.len(), 2);
    }
}
