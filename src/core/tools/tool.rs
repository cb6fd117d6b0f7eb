use std::any::Any;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::error::ToolError;
use crate::core::tools::descriptor::ToolDescriptor;
use crate::core::tools::safe::{SafeTool, SafeToolResult};

/// A capability exposed to the model.
///
/// Arguments arrive as JSON and are decoded into [`Tool::Args`]; the output is
/// serialized back to text with [`Tool::encode_result`] before it reaches the model.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + Send + Sync + 'static;
    type Output: Serialize + Send + Sync + 'static;

    fn descriptor(&self) -> ToolDescriptor;

    /// Checks preconditions on decoded arguments before execution.
    fn validate(&self, _args: &Self::Args) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, args: Self::Args) -> Result<Self::Output, ToolError>;

    /// Text form of the output handed back to the model.
    fn encode_result(&self, output: &Self::Output) -> Result<String, ToolError> {
        serde_json::to_string(output).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// Decoded arguments with their concrete type erased.
pub type ErasedArgs = Box<dyn Any + Send>;

/// Object-safe view of a [`Tool`], used wherever tools are stored by name.
///
/// Implemented for every `Tool`; there is no reason to implement it by hand.
pub trait AnyTool: Send + Sync + 'static {
    fn tool_descriptor(&self) -> ToolDescriptor;

    fn as_any(&self) -> &dyn Any;

    /// Checks required parameters and decodes the raw JSON arguments.
    fn decode_args(&self, raw: serde_json::Value) -> Result<ErasedArgs, String>;

    /// Runs the tool through [`SafeTool`] with previously decoded arguments.
    fn execute_erased(&self, args: ErasedArgs) -> BoxFuture<'_, SafeToolResult>;
}

impl<T: Tool> AnyTool for T {
    fn tool_descriptor(&self) -> ToolDescriptor {
        self.descriptor()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn decode_args(&self, raw: serde_json::Value) -> Result<ErasedArgs, String> {
        let descriptor = self.descriptor();
        let missing = descriptor.missing_required(&raw);
        if !missing.is_empty() {
            return Err(format!("missing required parameter(s): {}", missing.join(", ")));
        }
        serde_json::from_value::<T::Args>(raw)
            .map(|args| Box::new(args) as ErasedArgs)
            .map_err(|e| e.to_string())
    }

    fn execute_erased(&self, args: ErasedArgs) -> BoxFuture<'_, SafeToolResult> {
        Box::pin(async move {
            match args.downcast::<T::Args>() {
                Ok(args) => SafeTool::new(self).execute(*args).await.into_json(),
                Err(_) => SafeToolResult::Failure {
                    message: format!(
                        "Tool '{}' received arguments of the wrong type",
                        self.descriptor().name
                    ),
                },
            }
        })
    }
}
