use async_trait::async_trait;
use futures::future::join_all;

use super::node::{NodeLogic, StrategyNode};
use super::strategy::{FINISH, START, Strategy};
use crate::core::context::AgentContext;
use crate::core::error::AgentError;
use crate::core::feature::events::*;
use crate::core::value::NodeValue;

impl Strategy {
    /// Runs the strategy from its start node until an edge reaches the finish node.
    ///
    /// Fires the strategy started/finished hooks around [`Strategy::run`].
    pub async fn execute(
        &self,
        ctx: &AgentContext,
        input: NodeValue,
    ) -> Result<NodeValue, AgentError> {
        let pipeline = ctx.pipeline();
        pipeline
            .on_strategy_started(StrategyStartedEvent {
                run_id: ctx.run_id(),
                strategy_name: self.name().to_string(),
            })
            .await;

        let result = self.run(ctx, input).await?;

        pipeline
            .on_strategy_finished(StrategyFinishedEvent {
                run_id: ctx.run_id(),
                strategy_name: self.name().to_string(),
                result: result.clone(),
            })
            .await;
        Ok(result)
    }

    /// The traversal loop: execute the current node, take the first outgoing
    /// edge accepting its output, repeat.
    pub async fn run(&self, ctx: &AgentContext, input: NodeValue) -> Result<NodeValue, AgentError> {
        let mut current = self.lookup(START)?;
        let mut value = input;

        loop {
            ctx.tick()?;
            let output = self.execute_node(ctx, current, value).await?;

            let Some((target, next)) = self
                .edges_from(current.name())
                .iter()
                .find_map(|edge| edge.traverse(output.clone()).map(|v| (edge.target(), v)))
            else {
                log::error!(
                    "Strategy '{}': no edge out of '{}' accepts {:?}",
                    self.name(),
                    current.name(),
                    output
                );
                return Err(AgentError::UnhandledOutput {
                    node: current.name().to_string(),
                    kind: output.kind(),
                });
            };

            log::debug!("Strategy '{}': {} -> {}", self.name(), current.name(), target);
            if target == FINISH {
                return Ok(next);
            }
            current = self.lookup(target)?;
            value = next;
        }
    }

    async fn execute_node(
        &self,
        ctx: &AgentContext,
        node: &StrategyNode,
        input: NodeValue,
    ) -> Result<NodeValue, AgentError> {
        let pipeline = ctx.pipeline();
        pipeline
            .on_before_node(BeforeNodeEvent {
                run_id: ctx.run_id(),
                node_name: node.name().to_string(),
                input: input.clone(),
            })
            .await;

        match node.execute(ctx, input.clone()).await {
            Ok(output) => {
                pipeline
                    .on_after_node(AfterNodeEvent {
                        run_id: ctx.run_id(),
                        node_name: node.name().to_string(),
                        input,
                        output: output.clone(),
                    })
                    .await;
                Ok(output)
            }
            Err(e) => {
                pipeline
                    .on_node_error(NodeErrorEvent {
                        run_id: ctx.run_id(),
                        node_name: node.name().to_string(),
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&StrategyNode, AgentError> {
        self.node(name).ok_or_else(|| {
            AgentError::node(name, format!("not part of strategy '{}'", self.name()))
        })
    }
}

/// Runs a nested strategy as a single node.
pub(crate) struct SubgraphLogic {
    strategy: Strategy,
}

impl SubgraphLogic {
    pub(crate) fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl NodeLogic for SubgraphLogic {
    async fn execute(&self, ctx: &AgentContext, input: NodeValue) -> Result<NodeValue, AgentError> {
        self.strategy.execute(ctx, input).await
    }
}

/// Runs several strategies on the same input and joins their outputs.
pub(crate) struct ParallelLogic {
    branches: Vec<Strategy>,
}

impl ParallelLogic {
    pub(crate) fn new(branches: Vec<Strategy>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl NodeLogic for ParallelLogic {
    async fn execute(&self, ctx: &AgentContext, input: NodeValue) -> Result<NodeValue, AgentError> {
        let runs = self
            .branches
            .iter()
            .map(|branch| branch.execute(ctx, input.clone()));
        let outputs = join_all(runs)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodeValue::List(outputs))
    }
}
