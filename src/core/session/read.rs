use super::context::LLMState;
use super::{SessionState, SessionStatus};
use crate::core::error::AgentError;
use crate::core::prompt::Prompt;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::llm::LLModel;

/// Read-only view of the committed prompt, tools and model.
///
/// Clones share the same open/closed state; once the enclosing
/// `read_session` block ends every accessor fails with
/// [`AgentError::SessionClosed`].
#[derive(Debug, Clone)]
pub struct LLMReadSession {
    status: SessionStatus,
    state: LLMState,
}

impl LLMReadSession {
    pub(crate) fn new(state: LLMState) -> Self {
        Self {
            status: SessionStatus::open(),
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    pub fn prompt(&self) -> Result<&Prompt, AgentError> {
        self.status.ensure_open()?;
        Ok(&self.state.prompt)
    }

    pub fn tools(&self) -> Result<&[ToolDescriptor], AgentError> {
        self.status.ensure_open()?;
        Ok(&self.state.tools)
    }

    pub fn model(&self) -> Result<&LLModel, AgentError> {
        self.status.ensure_open()?;
        Ok(&self.state.model)
    }

    pub(crate) fn close(&self) {
        self.status.close();
    }
}
