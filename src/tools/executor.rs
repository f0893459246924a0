//! Resolve, validate and run tool calls.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::AbortHandle;
use tracing::debug;

use super::arguments::ToolArguments;
use super::registry::ToolRegistry;
use super::tool::ToolExecutionContext;
use super::validation::validate_arguments;
use crate::error::ToolError;
use crate::types::{ToolCall, ToolCallResult};

/// Runs tool calls against a registry. Every call yields a result; failures
/// are folded into the result's `error` field.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one call.
    pub async fn execute(&self, call: &ToolCall) -> ToolCallResult {
        match self.try_execute(call).await {
            Ok(text) => ToolCallResult::success(&call.id, text),
            Err(err) => {
                debug!(tool = call.name(), call_id = %call.id, error = %err, "tool call failed");
                ToolCallResult::failure(&call.id, err.detail())
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self.registry.resolve(call.name())?;
        let args = ToolArguments::parse(call.arguments())?;
        validate_arguments(args.raw(), &tool.parameters().schema)?;
        let ctx = ToolExecutionContext {
            tool_call_id: call.id.clone(),
            tool_name: call.name().to_string(),
        };
        tool.execute(&args, &ctx).await
    }

    /// Execute all calls concurrently and wait for every one of them.
    ///
    /// Results come back in call order. Each call runs in its own task, so a
    /// panicking handler only fails its own call. Dropping the returned future
    /// aborts the calls still running.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolCallResult> {
        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let executor = self.clone();
                tokio::spawn(async move { executor.execute(&call).await })
            })
            .collect();
        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        join_all(handles)
            .await
            .into_iter()
            .zip(calls)
            .map(|(joined, call)| {
                joined.unwrap_or_else(|err| {
                    let message = if err.is_panic() {
                        "handler panicked"
                    } else {
                        "handler was cancelled"
                    };
                    ToolCallResult::failure(
                        &call.id,
                        ToolError::execution(call.name(), message).to_string(),
                    )
                })
            })
            .collect()
    }
}

struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
