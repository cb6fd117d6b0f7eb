//! LLM sessions.
//!
//! An [`LLMContext`] owns the prompt, the offered tools and the model of one run.
//! Access goes through scoped sessions: at most one [`LLMWriteSession`] at a time,
//! or any number of concurrent [`LLMReadSession`]s, never both.

pub mod context;
pub mod read;
pub mod structured;
pub mod write;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::error::AgentError;

pub use context::LLMContext;
pub use read::LLMReadSession;
pub use structured::{StructuredRequestConfig, StructuredResponse};
pub use write::LLMWriteSession;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Open/closed flag shared by every clone of a session.
#[derive(Debug, Clone)]
pub(crate) struct SessionStatus(Arc<AtomicBool>);

impl SessionStatus {
    pub(crate) fn open() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn state(&self) -> SessionState {
        if self.0.load(Ordering::Acquire) {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    pub(crate) fn close(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub(crate) fn ensure_open(&self) -> Result<(), AgentError> {
        match self.state() {
            SessionState::Open => Ok(()),
            SessionState::Closed => {
                log::error!("LLM session used after it was closed");
                Err(AgentError::SessionClosed)
            }
        }
    }
}
