use std::collections::{HashMap, HashSet, VecDeque};

use super::edge::Edge;
use super::executor::{ParallelLogic, SubgraphLogic};
use super::node::StrategyNode;
use crate::core::error::GraphError;
use crate::core::validation::ValidationResult;
use crate::core::value::ValueKind;

/// Name of the entry node every strategy has.
pub const START: &str = "__start__";

/// Name of the exit node every strategy has. It is never executed; reaching it
/// ends the run with the value carried by the edge.
pub const FINISH: &str = "__finish__";

/// A validated graph of nodes and edges.
#[derive(Clone, Debug)]
pub struct Strategy {
    name: String,
    input: ValueKind,
    output: ValueKind,
    tool_stage: Option<String>,
    nodes: HashMap<String, StrategyNode>,
    edges: HashMap<String, Vec<Edge>>,
}

impl Strategy {
    pub fn builder(name: impl Into<String>) -> StrategyBuilder {
        StrategyBuilder::new(name)
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

    /// Registry stage whose tools are offered to the model during this strategy.
    pub fn tool_stage(&self) -> Option<&str> {
        self.tool_stage.as_deref()
    }

    pub fn node(&self, name: &str) -> Option<&StrategyNode> {
        self.nodes.get(name)
    }

    /// Outgoing edges of `node`, in declaration order.
    pub fn edges_from(&self, node: &str) -> &[Edge] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Assembles a [`Strategy`] and type-checks it on [`build`](StrategyBuilder::build).
///
/// ```rust
/// use stratagem::prelude::*;
///
/// let strategy = Strategy::builder("echo")
///     .input(ValueKind::Text)
///     .output(ValueKind::Text)
///     .node(node_do_nothing("pass"))
///     .edge(START, Edge::forward_to("pass"))
///     .edge("pass", Edge::forward_to(FINISH))
///     .build()
///     .unwrap();
/// assert_eq!(strategy.name(), "echo");
/// ```
pub struct StrategyBuilder {
    name: String,
    input: ValueKind,
    output: ValueKind,
    tool_stage: Option<String>,
    nodes: Vec<StrategyNode>,
    edges: Vec<(String, Edge)>,
    errors: Vec<GraphError>,
}

impl StrategyBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: ValueKind::Any,
            output: ValueKind::Any,
            tool_stage: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn input(mut self, kind: ValueKind) -> Self {
        self.input = kind;
        self
    }

    pub fn output(mut self, kind: ValueKind) -> Self {
        self.output = kind;
        self
    }

    pub fn tool_stage(mut self, stage: impl Into<String>) -> Self {
        self.tool_stage = Some(stage.into());
        self
    }

    pub fn node(mut self, node: StrategyNode) -> Self {
        if node.name() == START || node.name() == FINISH {
            self.errors.push(GraphError::ReservedName(node.name().to_string()));
        } else if self.nodes.iter().any(|n| n.name() == node.name()) {
            self.errors.push(GraphError::DuplicateNode(node.name().to_string()));
        } else {
            self.nodes.push(node);
        }
        self
    }

    /// Embeds a complete strategy as a single node.
    pub fn subgraph(self, name: impl Into<String>, strategy: Strategy) -> Self {
        let (input, output) = (strategy.input, strategy.output);
        self.node(StrategyNode::new(name, input, output, SubgraphLogic::new(strategy)))
    }

    /// A node running every branch on the same input concurrently; its output
    /// is a list with one entry per branch, in branch order.
    pub fn parallel(self, name: impl Into<String>, branches: Vec<Strategy>) -> Self {
        let input = branches
            .iter()
            .map(|b| b.input)
            .find(|k| *k != ValueKind::Any)
            .unwrap_or(ValueKind::Any);
        self.node(StrategyNode::new(
            name,
            input,
            ValueKind::List,
            ParallelLogic::new(branches),
        ))
    }

    /// Adds an edge out of `from`. Edges of one node are tried in the order added.
    pub fn edge(mut self, from: impl Into<String>, edge: Edge) -> Self {
        self.edges.push((from.into(), edge));
        self
    }

    /// Type-checks the graph without consuming the builder.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut kinds: HashMap<&str, (ValueKind, ValueKind)> = self
            .nodes
            .iter()
            .map(|n| (n.name(), (n.input_kind(), n.output_kind())))
            .collect();
        kinds.insert(START, (self.input, self.input));
        kinds.insert(FINISH, (self.output, self.output));

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, edge) in &self.edges {
            let target = edge.target();
            let Some(&(_, source_output)) = kinds.get(from.as_str()) else {
                result.add_error(format!("Edge source '{}' is not a node", from));
                continue;
            };
            if from == FINISH {
                result.add_error("The finish node cannot have outgoing edges");
                continue;
            }
            let Some(&(target_input, _)) = kinds.get(target) else {
                result.add_error(format!("Edge '{}' -> '{}' targets an unknown node", from, target));
                continue;
            };
            if target == START {
                result.add_error(format!("Edge '{}' -> '{}' re-enters the start node", from, target));
                continue;
            }
            match edge.delivered_kind(source_output) {
                Ok(delivered) if !delivered.fits(target_input) => result.add_error(format!(
                    "Edge '{}' -> '{}' delivers {} but '{}' expects {}",
                    from, target, delivered, target, target_input
                )),
                Ok(_) => {}
                Err(step) => result.add_error(format!(
                    "Edge '{}' -> '{}' cannot accept the {} output of '{}': {}",
                    from, target, source_output, from, step
                )),
            }
            adjacency.entry(from.as_str()).or_default().push(target);
        }

        let mut reachable: HashSet<&str> = HashSet::from([START]);
        let mut queue = VecDeque::from([START]);
        while let Some(node) = queue.pop_front() {
            for &next in adjacency.get(node).into_iter().flatten() {
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for node in std::iter::once(START).chain(self.nodes.iter().map(|n| n.name())) {
            if reachable.contains(node) && !adjacency.contains_key(node) {
                result.add_warning(format!(
                    "Node '{}' has no outgoing edges; runs reaching it will fail",
                    node
                ));
            }
        }
        if !reachable.contains(FINISH) {
            result.add_warning("The finish node is unreachable from the start node");
        }
        result
    }

    /// Validates and produces the strategy. Warnings are logged; errors fail the build.
    pub fn build(mut self) -> Result<Strategy, GraphError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        let validation = self.validate();
        validation.log_summary(&self.name);
        if !validation.is_safe() {
            return Err(GraphError::Validation {
                strategy: self.name,
                issues: validation.issues,
            });
        }

        let mut nodes: HashMap<String, StrategyNode> = self
            .nodes
            .into_iter()
            .map(|n| (n.name().to_string(), n))
            .collect();
        nodes.insert(START.to_string(), StrategyNode::identity(START, self.input));
        nodes.insert(FINISH.to_string(), StrategyNode::identity(FINISH, self.output));

        let mut edges: HashMap<String, Vec<Edge>> = HashMap::new();
        for (from, edge) in self.edges {
            edges.entry(from).or_default().push(edge);
        }

        Ok(Strategy {
            name: self.name,
            input: self.input,
            output: self.output,
            tool_stage: self.tool_stage,
            nodes,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::nodes::node_do_nothing;
    use crate::core::validation::ValidationIssue;

    fn text_node(name: &str) -> StrategyNode {
        StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Text, |_ctx, input| {
            Box::pin(async move { Ok(input) })
        })
    }

    #[test]
    fn test_rejects_unknown_target_and_start_reentry() {
        let err = Strategy::builder("s")
            .node(node_do_nothing("a"))
            .edge(START, Edge::forward_to("a"))
            .edge("a", Edge::forward_to("ghost"))
            .edge("a", Edge::forward_to(START))
            .build()
            .unwrap_err();
        match err {
            GraphError::Validation { issues, .. } => {
                let errors = issues
                    .iter()
                    .filter(|i| matches!(i, ValidationIssue::Error(_)))
                    .count();
                assert_eq!(errors, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejects_kind_mismatch() {
        let err = Strategy::builder("s")
            .input(ValueKind::Json)
            .node(text_node("a"))
            .edge(START, Edge::forward_to("a"))
            .edge("a", Edge::forward_to(FINISH))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation { .. }));

        let err = Strategy::builder("s")
            .node(text_node("a"))
            .edge(START, Edge::forward_to("a"))
            .edge("a", Edge::forward_to(FINISH).on_tool_call(|_| true))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::Validation { .. }));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let err = Strategy::builder("s")
            .node(node_do_nothing(FINISH))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::ReservedName(_)));

        let err = Strategy::builder("s")
            .node(node_do_nothing("a"))
            .node(node_do_nothing("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(_)));
    }

    #[test]
    fn test_dead_ends_are_warnings() {
        let builder = Strategy::builder("s")
            .node(node_do_nothing("a"))
            .edge(START, Edge::forward_to("a"));
        let validation = builder.validate();
        assert!(validation.is_safe());
        assert_eq!(validation.warnings().count(), 2);
        assert!(builder.build().is_ok());
    }
}
