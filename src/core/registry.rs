/// Tool Registry
///
/// Holds every registered tool, keyed by name, in registration order. The
/// registry is built once before serving and then shared read-only as
/// `Arc<ToolRegistry>` by all transports.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::core::context::{RequestContext, ToolContext};
use crate::core::error::{DispatchError, RegistrationError};
use crate::core::output::{CallToolResult, IntoToolOutput};
use crate::core::schema::ToolArgs;
use crate::core::tool::{ArgumentPayload, Tool, ToolAdapter, ToolDescriptor};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A duplicate name is rejected and leaves the registry
    /// unchanged.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistrationError> {
        let name = tool.descriptor().name.clone();
        if self.index.contains_key(&name) {
            return Err(RegistrationError::DuplicateTool { name });
        }
        tracing::debug!(tool = %name, "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    /// Wrap `handler` in a `ToolAdapter` and register it.
    pub fn add<F, Fut, P, R, E>(
        &mut self,
        name: &str,
        description: &str,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(ToolContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        P: ToolArgs,
        R: IntoToolOutput + Send + 'static,
        E: Display + Send + 'static,
    {
        self.register(ToolAdapter::new(name, description, handler)?)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Route a call to the named tool under `request`.
    pub async fn call(
        &self,
        request: Arc<RequestContext>,
        name: &str,
        arguments: ArgumentPayload,
    ) -> Result<Option<CallToolResult>, DispatchError> {
        let tool = self
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let started = Instant::now();
        let ctx = ToolContext::new(request, name);
        let result = tool.invoke(ctx, arguments).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::info!(tool = %name, elapsed_ms, "tool call succeeded"),
            Err(e) => tracing::warn!(
                tool = %name,
                elapsed_ms,
                kind = ?e.kind(),
                error = %e,
                "tool call failed"
            ),
        }
        Ok(result?)
    }
}
