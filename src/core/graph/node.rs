use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::core::context::AgentContext;
use crate::core::error::AgentError;
use crate::core::value::{NodeValue, ValueKind};

/// The work performed by a strategy node.
///
/// Implement this for reusable nodes; for one-offs use [`StrategyNode::from_fn`].
#[async_trait]
pub trait NodeLogic: Send + Sync {
    async fn execute(&self, ctx: &AgentContext, input: NodeValue) -> Result<NodeValue, AgentError>;
}

/// Future returned by closure nodes.
pub type NodeFuture = BoxFuture<'static, Result<NodeValue, AgentError>>;

struct FnLogic<F>(F);

#[async_trait]
impl<F> NodeLogic for FnLogic<F>
where
    F: Fn(AgentContext, NodeValue) -> NodeFuture + Send + Sync,
{
    async fn execute(&self, ctx: &AgentContext, input: NodeValue) -> Result<NodeValue, AgentError> {
        (self.0)(ctx.clone(), input).await
    }
}

/// A named node with a declared input and output kind.
#[derive(Clone)]
pub struct StrategyNode {
    name: String,
    input: ValueKind,
    output: ValueKind,
    logic: Arc<dyn NodeLogic>,
}

impl std::fmt::Debug for StrategyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyNode")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

impl StrategyNode {
    pub fn new(
        name: impl Into<String>,
        input: ValueKind,
        output: ValueKind,
        logic: impl NodeLogic + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output,
            logic: Arc::new(logic),
        }
    }

    /// Builds a node from a closure. The closure receives its own handle on the
    /// context, so the returned future can be `'static`.
    ///
    /// ```rust
    /// use stratagem::prelude::*;
    ///
    /// let shout = StrategyNode::from_fn("shout", ValueKind::Text, ValueKind::Text, |_ctx, input| {
    ///     Box::pin(async move {
    ///         let text = input.as_text().unwrap_or_default().to_uppercase();
    ///         Ok(NodeValue::Text(text))
    ///     })
    /// });
    /// assert_eq!(shout.name(), "shout");
    /// ```
    pub fn from_fn<F>(name: impl Into<String>, input: ValueKind, output: ValueKind, f: F) -> Self
    where
        F: Fn(AgentContext, NodeValue) -> NodeFuture + Send + Sync + 'static,
    {
        Self::new(name, input, output, FnLogic(f))
    }

    /// A node returning its input unchanged.
    pub(crate) fn identity(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::from_fn(name, kind, kind, |_ctx, input| Box::pin(async move { Ok(input) }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_kind(&self) -> ValueKind {
        self.input
    }

    pub fn output_kind(&self) -> ValueKind {
        self.output
    }

    /// Runs the node, enforcing its declared kinds at the boundary.
    pub(crate) async fn execute(
        &self,
        ctx: &AgentContext,
        input: NodeValue,
    ) -> Result<NodeValue, AgentError> {
        let actual = input.kind();
        if !actual.fits(self.input) {
            return Err(AgentError::UnexpectedInput {
                node: self.name.clone(),
                expected: self.input,
                actual,
            });
        }
        let output = self.logic.execute(ctx, input).await?;
        if !output.kind().fits(self.output) {
            return Err(AgentError::node(
                &self.name,
                format!(
                    "declared a {} output but produced {}",
                    self.output,
                    output.kind()
                ),
            ));
        }
        Ok(output)
    }
}
