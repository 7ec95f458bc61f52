/// Tool Adapter
///
/// Turns a typed async handler into a uniformly callable MCP tool. The
/// adapter derives the tool's input schema from the handler's parameter type
/// at registration, and at call time moves the raw argument payload through
/// the canonical JSON encoding into a fresh parameter record, invokes the
/// handler, and normalizes whatever it returns.
///
/// Handler shape is checked by the compiler: a tool handler is
/// `Fn(ToolContext, P) -> impl Future<Output = Result<R, E>>` with
/// `P: ToolArgs`, `R: IntoToolOutput` and `E: Display`.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::context::ToolContext;
use crate::core::error::{InvocationError, RegistrationError};
use crate::core::output::{CallToolResult, IntoToolOutput};
use crate::core::schema::{InputSchema, ToolArgs, derive_input_schema};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

/// Raw `arguments` object of a `tools/call` request.
pub type ArgumentPayload = Map<String, Value>;

/// `None` means the handler had nothing to report.
pub type InvocationResult = Result<Option<CallToolResult>, InvocationError>;

/// Public description of a tool, as listed by `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// A callable tool.
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    fn invoke(&self, ctx: ToolContext, arguments: ArgumentPayload)
    -> ToolFuture<'_, InvocationResult>;
}

type Invoker = Arc<dyn Fn(ToolContext, Vec<u8>) -> ToolFuture<'static, InvocationResult> + Send + Sync>;

/// A typed handler wrapped behind the uniform `Tool` interface.
///
/// ```rust
/// use mcp_grafana::core::context::ToolContext;
/// use mcp_grafana::core::schema::ToolArgs;
/// use mcp_grafana::core::tool::ToolAdapter;
///
/// #[derive(serde::Deserialize, schemars::JsonSchema)]
/// struct HelloParams {
///     /// Who to greet
///     name: String,
/// }
///
/// impl ToolArgs for HelloParams {
///     const REQUIRED: &'static [&'static str] = &["name"];
/// }
///
/// let tool = ToolAdapter::new("hello", "Say hello", |_ctx: ToolContext, params: HelloParams| async move {
///     Ok::<_, String>(format!("hello {}", params.name))
/// })
/// .unwrap();
/// assert_eq!(tool.descriptor().input_schema.required(), ["name"]);
/// ```
///
/// Anything that is not a function is rejected:
///
/// ```compile_fail
/// # use mcp_grafana::core::tool::ToolAdapter;
/// let tool = ToolAdapter::new("hello", "Say hello", "not a function");
/// ```
///
/// So is a handler that does not take exactly two arguments:
///
/// ```compile_fail
/// # use mcp_grafana::core::schema::ToolArgs;
/// # use mcp_grafana::core::tool::ToolAdapter;
/// # #[derive(serde::Deserialize, schemars::JsonSchema)]
/// # struct HelloParams { name: String }
/// # impl ToolArgs for HelloParams { const REQUIRED: &'static [&'static str] = &[]; }
/// let tool = ToolAdapter::new("hello", "Say hello", |params: HelloParams| async move {
///     Ok::<_, String>(params.name)
/// });
/// ```
///
/// The first argument must be the execution context:
///
/// ```compile_fail
/// # use mcp_grafana::core::schema::ToolArgs;
/// # use mcp_grafana::core::tool::ToolAdapter;
/// # #[derive(serde::Deserialize, schemars::JsonSchema)]
/// # struct HelloParams { name: String }
/// # impl ToolArgs for HelloParams { const REQUIRED: &'static [&'static str] = &[]; }
/// let tool = ToolAdapter::new("hello", "Say hello", |ctx: String, params: HelloParams| async move {
///     Ok::<_, String>(format!("{ctx} {}", params.name))
/// });
/// ```
///
/// The handler must return a `Result`:
///
/// ```compile_fail
/// # use mcp_grafana::core::context::ToolContext;
/// # use mcp_grafana::core::schema::ToolArgs;
/// # use mcp_grafana::core::tool::ToolAdapter;
/// # #[derive(serde::Deserialize, schemars::JsonSchema)]
/// # struct HelloParams { name: String }
/// # impl ToolArgs for HelloParams { const REQUIRED: &'static [&'static str] = &[]; }
/// let tool = ToolAdapter::new("hello", "Say hello", |_ctx: ToolContext, params: HelloParams| async move {
///     params.name
/// });
/// ```
///
/// And its error must be displayable:
///
/// ```compile_fail
/// # use mcp_grafana::core::context::ToolContext;
/// # use mcp_grafana::core::schema::ToolArgs;
/// # use mcp_grafana::core::tool::ToolAdapter;
/// # #[derive(serde::Deserialize, schemars::JsonSchema)]
/// # struct HelloParams { name: String }
/// # impl ToolArgs for HelloParams { const REQUIRED: &'static [&'static str] = &[]; }
/// let tool = ToolAdapter::new("hello", "Say hello", |_ctx: ToolContext, params: HelloParams| async move {
///     Err::<String, Vec<u8>>(params.name.into_bytes())
/// });
/// ```
#[derive(Clone)]
pub struct ToolAdapter {
    descriptor: ToolDescriptor,
    invoker: Invoker,
}

impl ToolAdapter {
    /// Validate the handler's parameter type and wrap the handler.
    pub fn new<F, Fut, P, R, E>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<Self, RegistrationError>
    where
        F: Fn(ToolContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        P: ToolArgs,
        R: IntoToolOutput + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        let input_schema = derive_input_schema::<P>()?;

        let handler = Arc::new(handler);
        let invoker: Invoker = Arc::new(move |ctx: ToolContext, encoded: Vec<u8>| {
            call_handler(Arc::clone(&handler), ctx, encoded).boxed()
        });

        Ok(Self {
            descriptor: ToolDescriptor {
                name,
                description: description.into(),
                input_schema,
            },
            invoker,
        })
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Invoke the tool with any serializable argument value.
    ///
    /// The value is first encoded to JSON; failure to encode is reported as
    /// `InvocationError::Marshal` without calling the handler.
    pub fn invoke_with<A: Serialize + ?Sized>(
        &self,
        ctx: ToolContext,
        arguments: &A,
    ) -> ToolFuture<'static, InvocationResult> {
        match serde_json::to_vec(arguments) {
            Ok(encoded) => (self.invoker)(ctx, encoded),
            Err(e) => futures_util::future::ready(Err(InvocationError::Marshal(e))).boxed(),
        }
    }
}

impl Tool for ToolAdapter {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn invoke(
        &self,
        ctx: ToolContext,
        arguments: ArgumentPayload,
    ) -> ToolFuture<'_, InvocationResult> {
        self.invoke_with(ctx, &arguments)
    }
}

impl std::fmt::Debug for ToolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAdapter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

async fn call_handler<F, Fut, P, R, E>(
    handler: Arc<F>,
    ctx: ToolContext,
    encoded: Vec<u8>,
) -> InvocationResult
where
    F: Fn(ToolContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: ToolArgs,
    R: IntoToolOutput + Send + 'static,
    E: Display + Send + 'static,
{
    let params: P = serde_json::from_slice(&encoded).map_err(InvocationError::Unmarshal)?;

    let outcome = AssertUnwindSafe(async move { handler(ctx, params).await })
        .catch_unwind()
        .await
        .map_err(|payload| InvocationError::Panicked(panic_message(payload.as_ref())))?;

    match outcome {
        Ok(value) => value
            .into_tool_output()
            .map(|output| output.into_result())
            .map_err(InvocationError::Serialization),
        Err(e) => Err(InvocationError::Handler(e.to_string())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
