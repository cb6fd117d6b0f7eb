use std::collections::HashSet;
use std::ops::Add;
use std::sync::Arc;

use crate::core::error::RegistryError;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::tool::{AnyTool, Tool};

/// Name of the stage used when none is specified.
pub const DEFAULT_STAGE: &str = "default";

/// A tool paired with the descriptor it was registered under.
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub tool: Arc<dyn AnyTool>,
}

/// A named, ordered group of tools.
#[derive(Clone)]
pub struct ToolStage {
    name: String,
    tools: Vec<RegisteredTool>,
}

impl ToolStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
        }
    }

    pub fn tool<T: Tool>(self, tool: T) -> Self {
        self.shared_tool(Arc::new(tool))
    }

    pub fn shared_tool(mut self, tool: Arc<dyn AnyTool>) -> Self {
        self.tools.push(RegisteredTool {
            descriptor: tool.tool_descriptor(),
            tool,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    /// First tool registered under `name`.
    pub fn get_tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.descriptor.name == name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.tools.is_empty() {
            return Err(RegistryError::EmptyStage(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for entry in &self.tools {
            if !seen.insert(entry.descriptor.name.as_str()) {
                return Err(RegistryError::DuplicateTool {
                    stage: self.name.clone(),
                    tool: entry.descriptor.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Maps stage names to the tools available in that stage.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    stages: Vec<ToolStage>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry without any stage.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with all `tools` in the default stage.
    pub fn simple(tools: Vec<Arc<dyn AnyTool>>) -> Result<Self, RegistryError> {
        let stage = tools
            .into_iter()
            .fold(ToolStage::new(DEFAULT_STAGE), |stage, tool| stage.shared_tool(tool));
        Self::builder().stage(stage).build()
    }

    pub fn stages(&self) -> &[ToolStage] {
        &self.stages
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&ToolStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// First stage declaring a tool called `tool_name`.
    pub fn stage_by_tool_name(&self, tool_name: &str) -> Option<&ToolStage> {
        self.stages.iter().find(|s| s.get_tool(tool_name).is_some())
    }

    /// The stage named [`DEFAULT_STAGE`], or the first stage if none is.
    pub fn default_stage(&self) -> Option<&ToolStage> {
        self.stage_by_name(DEFAULT_STAGE).or_else(|| self.stages.first())
    }

    /// First tool called `name` across all stages.
    pub fn get_tool_by_name(&self, name: &str) -> Option<&RegisteredTool> {
        self.stages.iter().find_map(|s| s.get_tool(name))
    }

    /// First registered tool of concrete type `T`.
    pub fn get_tool<T: Tool>(&self) -> Option<&T> {
        self.stages
            .iter()
            .flat_map(|s| s.tools.iter())
            .find_map(|t| t.tool.as_any().downcast_ref::<T>())
    }

    /// Descriptors of every tool, first registration winning on name clashes.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut seen = HashSet::new();
        self.stages
            .iter()
            .flat_map(|s| s.tools.iter())
            .filter(|t| seen.insert(t.descriptor.name.clone()))
            .map(|t| t.descriptor.clone())
            .collect()
    }

    /// Unions two registries. Stages with the same name have their tool lists
    /// concatenated; a name present in both stays resolvable to the first one.
    pub fn combine(mut self, other: ToolRegistry) -> ToolRegistry {
        for stage in other.stages {
            match self.stages.iter_mut().find(|s| s.name == stage.name) {
                Some(existing) => existing.tools.extend(stage.tools),
                None => self.stages.push(stage),
            }
        }
        self
    }
}

impl Add for ToolRegistry {
    type Output = ToolRegistry;

    fn add(self, rhs: ToolRegistry) -> ToolRegistry {
        self.combine(rhs)
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    stages: Vec<ToolStage>,
}

impl ToolRegistryBuilder {
    pub fn stage(mut self, stage: ToolStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validates every stage and produces the registry.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                return Err(RegistryError::DuplicateStage(stage.name.clone()));
            }
            stage.validate()?;
        }
        Ok(ToolRegistry {
            stages: self.stages,
        })
    }
}
