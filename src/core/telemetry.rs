use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::core::error::FeatureError;
use crate::core::feature::AgentFeature;
use crate::core::feature::events::*;

/// A single entry in the execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AgentEvent,
}

/// Destination for trace events.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn process_message(&self, event: &TraceEvent) -> Result<(), FeatureError>;
    async fn close(&self) -> Result<(), FeatureError>;
}

/// Simple in-memory collector for traces.
#[derive(Default)]
pub struct MemoryTraceSink {
    traces: Mutex<Vec<TraceEvent>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn traces(&self) -> Vec<TraceEvent> {
        self.traces.lock().await.clone()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn process_message(&self, event: &TraceEvent) -> Result<(), FeatureError> {
        self.traces.lock().await.push(event.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), FeatureError> {
        Ok(())
    }
}

/// Writes every trace event to the `log` facade.
pub struct LogTraceSink {
    level: log::Level,
}

impl LogTraceSink {
    pub fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogTraceSink {
    fn default() -> Self {
        Self::new(log::Level::Info)
    }
}

#[async_trait]
impl TraceSink for LogTraceSink {
    async fn process_message(&self, event: &TraceEvent) -> Result<(), FeatureError> {
        let body = serde_json::to_string(&event.event)
            .map_err(|e| FeatureError::new("log_trace_sink", e.to_string()))?;
        log::log!(self.level, "[{}] {}", event.event.name(), body);
        Ok(())
    }

    async fn close(&self) -> Result<(), FeatureError> {
        Ok(())
    }
}

/// Appends trace events to a file, one JSON object per line.
pub struct FileTraceSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    fn error(&self, e: impl std::fmt::Display) -> FeatureError {
        FeatureError::new("file_trace_sink", format!("{}: {}", self.path.display(), e))
    }
}

#[async_trait]
impl TraceSink for FileTraceSink {
    async fn process_message(&self, event: &TraceEvent) -> Result<(), FeatureError> {
        let mut line = serde_json::to_string(event).map_err(|e| self.error(e))?;
        line.push('\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| self.error(e))?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| self.error(e))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), FeatureError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await.map_err(|e| self.error(e))?;
        }
        Ok(())
    }
}

type EventFilter = Arc<dyn Fn(&AgentEvent) -> bool + Send + Sync>;

/// Feature recording hook payloads into trace sinks.
#[derive(Clone, Default)]
pub struct Tracing {
    sinks: Vec<Arc<dyn TraceSink>>,
    filter: Option<EventFilter>,
}

impl Tracing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Only events for which `filter` returns true are recorded.
    pub fn with_filter(mut self, filter: impl Fn(&AgentEvent) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Flushes and closes every sink. Failures are logged.
    pub async fn close(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                log::warn!("Failed to close trace sink: {}", e);
            }
        }
    }

    async fn record(&self, event: AgentEvent) -> Result<(), FeatureError> {
        if let Some(filter) = &self.filter {
            if !filter(&event) {
                return Ok(());
            }
        }
        let entry = TraceEvent {
            timestamp: Utc::now(),
            event,
        };
        for sink in &self.sinks {
            if let Err(e) = sink.process_message(&entry).await {
                log::warn!("Trace sink rejected '{}' event: {}", entry.event.name(), e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AgentFeature for Tracing {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_agent_created(&self, event: &AgentCreatedEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AgentCreated(event.clone())).await
    }

    async fn on_agent_started(&self, event: &AgentStartedEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AgentStarted(event.clone())).await
    }

    async fn on_agent_finished(&self, event: &AgentFinishedEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AgentFinished(event.clone())).await
    }

    async fn on_agent_run_error(&self, event: &AgentRunErrorEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AgentRunError(event.clone())).await
    }

    async fn on_strategy_started(&self, event: &StrategyStartedEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::StrategyStarted(event.clone())).await
    }

    async fn on_strategy_finished(
        &self,
        event: &StrategyFinishedEvent,
    ) -> Result<(), FeatureError> {
        self.record(AgentEvent::StrategyFinished(event.clone())).await
    }

    async fn on_before_node(&self, event: &BeforeNodeEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::BeforeNode(event.clone())).await
    }

    async fn on_after_node(&self, event: &AfterNodeEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AfterNode(event.clone())).await
    }

    async fn on_node_error(&self, event: &NodeErrorEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::NodeError(event.clone())).await
    }

    async fn on_before_llm_call(&self, event: &BeforeLLMCallEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::BeforeLLMCall(event.clone())).await
    }

    async fn on_after_llm_call(&self, event: &AfterLLMCallEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::AfterLLMCall(event.clone())).await
    }

    async fn on_tool_call(&self, event: &ToolCallEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::ToolCall(event.clone())).await
    }

    async fn on_tool_validation_error(
        &self,
        event: &ToolValidationErrorEvent,
    ) -> Result<(), FeatureError> {
        self.record(AgentEvent::ToolValidationError(event.clone())).await
    }

    async fn on_tool_call_failure(&self, event: &ToolCallFailureEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::ToolCallFailure(event.clone())).await
    }

    async fn on_tool_call_result(&self, event: &ToolCallResultEvent) -> Result<(), FeatureError> {
        self.record(AgentEvent::ToolCallResult(event.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tool_call(name: &str) -> ToolCallEvent {
        ToolCallEvent {
            run_id: Uuid::new_v4(),
            tool_call_id: Some("1".into()),
            tool_name: name.into(),
            tool_args: serde_json::json!({"a": 1}),
        }
    }

    #[tokio::test]
    async fn test_memory_sink_collects_filtered_events() {
        let sink = Arc::new(MemoryTraceSink::new());
        let tracing = Tracing::new()
            .with_sink(sink.clone())
            .with_filter(|event| matches!(event, AgentEvent::ToolCall(_)));

        tracing.on_tool_call(&tool_call("plus")).await.unwrap();
        tracing
            .on_strategy_started(&StrategyStartedEvent {
                run_id: Uuid::new_v4(),
                strategy_name: "s".into(),
            })
            .await
            .unwrap();

        let traces = sink.traces().await;
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].event.name(), "tool_call");
    }

    #[tokio::test]
    async fn test_file_sink_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let sink = Arc::new(FileTraceSink::new(&path));
        let tracing = Tracing::new().with_sink(sink);

        tracing.on_tool_call(&tool_call("plus")).await.unwrap();
        tracing.on_tool_call(&tool_call("minus")).await.unwrap();
        tracing.close().await;

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "tool_call");
        assert_eq!(first["tool_name"], "plus");
    }
}
