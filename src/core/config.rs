use crate::core::prompt::Prompt;
use crate::llm::LLModel;

pub const DEFAULT_MAX_AGENT_ITERATIONS: usize = 50;

/// Static configuration of an agent: the initial prompt, the model and the
/// node execution budget of a single run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub prompt: Prompt,
    pub model: LLModel,
    /// Upper bound on node executions per run, nested strategies included.
    pub max_agent_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prompt: Prompt::empty(),
            model: LLModel::ollama("llama3.2"),
            max_agent_iterations: DEFAULT_MAX_AGENT_ITERATIONS,
        }
    }
}

impl AgentConfig {
    pub fn new(model: LLModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = prompt;
        self
    }

    /// Starts the prompt with a system message.
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.prompt = self.prompt.update(|p| {
            p.system(system);
        });
        self
    }

    pub fn with_model(mut self, model: LLModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_agent_iterations(mut self, max: usize) -> Self {
        self.max_agent_iterations = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = AgentConfig::default();
        assert_eq!(config.max_agent_iterations, 50);
        assert!(config.prompt.is_empty());

        let config = AgentConfig::new(LLModel::ollama("qwen3"))
            .with_system_prompt("You are a calculator.")
            .with_max_agent_iterations(5);
        assert_eq!(config.model.id, "qwen3");
        assert_eq!(config.prompt.len(), 1);
        assert_eq!(config.max_agent_iterations, 5);
    }
}
