/// MCP Server Implementation
///
/// This module contains the MCP server including:
/// - JSON-RPC 2.0 request/response structures
/// - Method dispatch shared by both transports
/// - HTTP server setup with Actix Web, resolving Grafana configuration per request
/// - STDIO server for line-based communication, resolving configuration once per session

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Result,
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::core::config::{self, PartialConfig};
use crate::core::context::RequestContext;
use crate::core::error::{ConfigError, DispatchError, RegistrationError};
use crate::core::output::CallToolResult;
use crate::core::registry::ToolRegistry;
use crate::core::settings::ServerSettings;
use crate::core::tool::ArgumentPayload;
use crate::tools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// State shared by every request of either transport.
#[derive(Clone)]
pub struct AppState {
    /// Server name as reported in MCP initialize responses
    pub server_name: String,
    /// Server version string as reported in MCP initialize responses
    pub server_version: String,
    /// Grafana settings from the process environment, read once at startup
    pub environment: PartialConfig,
    /// Pooled HTTP client shared by all backend clients
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: &ServerSettings, environment: PartialConfig, http: reqwest::Client) -> Self {
        Self {
            server_name: settings.name.clone(),
            server_version: settings.version.clone(),
            environment,
            http,
        }
    }

    /// Context for a STDIO session: environment only.
    pub fn session_context(&self) -> Result<Arc<RequestContext>, ConfigError> {
        let config = config::session_config(&self.environment)?;
        Ok(Arc::new(RequestContext::new(config, &self.http)))
    }

    /// Context for one HTTP request: environment overridden by headers.
    pub fn request_context(&self, request: &HttpRequest) -> Result<Arc<RequestContext>, ConfigError> {
        let config = config::request_config(&self.environment, request.headers())?;
        Ok(Arc::new(RequestContext::new(config, &self.http)))
    }
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is None for notifications.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

impl MCPRequest {
    fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response structure for MCP protocol.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl MCPResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Route one parsed request to its method handler.
///
/// `context` is only consulted by `tools/call`, so configuration errors never
/// affect discovery methods. Notifications produce no response.
async fn dispatch<C>(
    state: &AppState,
    registry: &ToolRegistry,
    request: MCPRequest,
    context: C,
) -> Option<MCPResponse>
where
    C: FnOnce() -> Result<Arc<RequestContext>, ConfigError>,
{
    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification received");
        return None;
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(state, request.id),
        "tools/list" => handle_tools_list(registry, request.id),
        "tools/call" => handle_tools_call(registry, request.id, request.params, context).await,
        "ping" => MCPResponse::success(request.id, serde_json::json!({})),
        method => {
            tracing::debug!(method, "method not found");
            MCPResponse::failure(request.id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
        }
    };
    Some(response)
}

/// Handle MCP initialize method.
fn handle_initialize(state: &AppState, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": state.server_name,
                "version": state.server_version
            }
        }),
    )
}

fn tools_json(registry: &ToolRegistry) -> Vec<Value> {
    registry
        .descriptors()
        .filter_map(|descriptor| serde_json::to_value(descriptor).ok())
        .collect()
}

/// Handle MCP tools/list method.
fn handle_tools_list(registry: &ToolRegistry, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(id, serde_json::json!({ "tools": tools_json(registry) }))
}

/// Handle MCP tools/call method.
///
/// Unknown tools and malformed params are JSON-RPC errors. A tool that fails
/// is reported in-band as a result with `isError` set.
async fn handle_tools_call<C>(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
    context: C,
) -> MCPResponse
where
    C: FnOnce() -> Result<Arc<RequestContext>, ConfigError>,
{
    let Some(Value::Object(mut params)) = params else {
        return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
    };
    let name = match params.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name"),
    };
    let arguments = match params.remove("arguments") {
        None | Some(Value::Null) => ArgumentPayload::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(_) => {
            return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params: arguments must be an object");
        }
    };

    if registry.get(&name).is_none() {
        return MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {name}"));
    }
    let request = match context() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "rejecting call with invalid Grafana configuration");
            return MCPResponse::failure(id, INVALID_PARAMS, e.to_string());
        }
    };

    let result = match registry.call(request, &name, arguments).await {
        Ok(result) => result.unwrap_or_default(),
        Err(DispatchError::UnknownTool(name)) => {
            return MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {name}"));
        }
        Err(DispatchError::Invocation(e)) => CallToolResult::error_text(e.to_string()),
    };

    match serde_json::to_value(&result) {
        Ok(result) => MCPResponse::success(id, result),
        Err(e) => MCPResponse::failure(id, INTERNAL_ERROR, format!("Internal error: {e}")),
    }
}

/// Parse a JSON-RPC message, producing the `-32700` response on failure.
///
/// The request id is echoed when the text is valid JSON carrying one.
fn parse_request(text: &[u8]) -> Result<MCPRequest, MCPResponse> {
    serde_json::from_slice::<MCPRequest>(text).map_err(|e| {
        tracing::warn!(error = %e, "parse error");
        let id = serde_json::from_slice::<Value>(text)
            .ok()
            .and_then(|partial| partial.get("id").cloned());
        MCPResponse::failure(id, PARSE_ERROR, format!("Parse error: {e}"))
    })
}

/// Health check endpoint handler.
async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": state.server_name
    })))
}

/// MCP JSON-RPC request handler with metrics tracking.
///
/// Grafana configuration is resolved from this request's headers on top of
/// the environment, and only when a tool is called.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
    counter: web::Data<AtomicU64>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    counter.fetch_add(1, Ordering::Relaxed);

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(response) => return Ok(HttpResponse::Ok().json(response)),
    };

    let response = dispatch(&state, &registry, request, || state.request_context(&req)).await;
    Ok(match response {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    })
}

/// Metrics endpoint handler for monitoring.
///
/// Returns the total number of MCP requests processed since server start.
async fn metrics_handler(counter: web::Data<AtomicU64>) -> Result<HttpResponse> {
    let count = counter.load(Ordering::Relaxed);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requests_total": count,
        "status": "ok"
    })))
}

/// Server-Sent Events endpoint for tools discovery.
///
/// Emits a single event carrying every registered tool in `tools/list` form.
async fn sse_tools_discovery(registry: web::Data<ToolRegistry>) -> Result<HttpResponse> {
    use actix_web::http::header;

    let tools = tools_json(&registry);
    let tools_data = serde_json::json!({
        "count": tools.len(),
        "tools": tools,
    });
    let sse_data = format!(
        "data: {}\n\n",
        serde_json::to_string(&tools_data).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Disable nginx buffering
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Register the HTTP routes. Application data is attached by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_tools_discovery))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Build the registry holding every Grafana tool.
pub fn initialize_tools() -> Result<Arc<ToolRegistry>, RegistrationError> {
    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry)?;
    tracing::info!(tools = registry.len(), "tools registered");
    Ok(Arc::new(registry))
}

/// Run the MCP server in HTTP mode.
///
/// The server is configured with:
/// - Worker threads from settings (CPU count, max 16, by default)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive and request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(
    settings: &ServerSettings,
    state: AppState,
    registry: Arc<ToolRegistry>,
) -> std::io::Result<()> {
    let bind_addr = settings.bind_addr();
    let app_state = web::Data::new(state);
    let tool_registry = web::Data::from(registry);
    let request_count = web::Data::new(AtomicU64::new(0));

    tracing::info!(
        name = %app_state.server_name,
        version = %app_state.server_version,
        bind = %bind_addr,
        workers = settings.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(settings.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Handle one line of STDIO input.
async fn handle_stdio_line(
    state: &AppState,
    registry: &ToolRegistry,
    session: &Arc<RequestContext>,
    line: &str,
) -> Option<MCPResponse> {
    match parse_request(line.as_bytes()) {
        Ok(request) => dispatch(state, registry, request, || Ok(Arc::clone(session))).await,
        Err(response) => Some(response),
    }
}

/// Run the MCP server in STDIO mode.
///
/// Reads JSON-RPC requests line by line from stdin and writes one response
/// line per request to stdout. Grafana configuration comes from the
/// environment and is resolved once for the whole session. Logging goes to
/// stderr so it never mixes with the protocol stream.
pub async fn run_server_stdio(state: AppState, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

    let session = state
        .session_context()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    tracing::info!(
        name = %state.server_name,
        version = %state.server_version,
        grafana_url = %session.config().redacted_url(),
        "MCP server starting (STDIO mode)"
    );

    let mut stdin = BufReader::with_capacity(8192, tokio::io::stdin()).lines();
    let mut stdout = BufWriter::with_capacity(8192, tokio::io::stdout());

    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = handle_stdio_line(&state, &registry, &session, &line).await else {
            continue;
        };
        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, STDIO server stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GrafanaConfig;
    use crate::core::context::ToolContext;
    use crate::core::schema::ToolArgs;
    use actix_web::test;
    use pretty_assertions::assert_eq;
    use schemars::JsonSchema;

    #[derive(Debug, Default, Deserialize, JsonSchema)]
    #[serde(default)]
    struct GreetParams {
        /// Who to greet
        name: String,
    }

    impl ToolArgs for GreetParams {
        const REQUIRED: &'static [&'static str] = &["name"];
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .add("greet", "Greet someone", |_ctx: ToolContext, p: GreetParams| async move {
                if p.name.is_empty() {
                    return Err("name is required".to_string());
                }
                Ok(format!("hello {}", p.name))
            })
            .unwrap();
        registry
            .add("whoami", "Report the Grafana connection", |ctx: ToolContext, _p: GreetParams| async move {
                Ok::<_, String>(format!("{} {}", ctx.config().url, ctx.config().api_key_set()))
            })
            .unwrap();
        registry
            .add("quiet", "Returns nothing", |_ctx: ToolContext, _p: GreetParams| async move {
                Ok::<(), String>(())
            })
            .unwrap();
        Arc::new(registry)
    }

    fn state(environment: PartialConfig) -> AppState {
        AppState {
            server_name: "mcp-grafana-test".to_string(),
            server_version: "9.9.9".to_string(),
            environment,
            http: reqwest::Client::new(),
        }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .app_data(web::Data::from(registry()))
                    .app_data(web::Data::new(AtomicU64::new(0)))
                    .configure(configure),
            )
            .await
        };
    }

    fn call(name: &str, arguments: Value) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = app!(state(PartialConfig::default()));
        let response: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response["status"], "ok");
        assert_eq!(response["service"], "mcp-grafana-test");
    }

    #[actix_web::test]
    async fn initialize_reports_server_info() {
        let app = app!(state(PartialConfig::default()));
        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["version"], "9.9.9");
    }

    #[actix_web::test]
    async fn tools_list_uses_input_schema_key() {
        let app = app!(state(PartialConfig::default()));
        let request = test::TestRequest::post()
            .uri("/")
            .set_json(serde_json::json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["id"], "a");
        let tool = &response["result"]["tools"][0];
        assert_eq!(tool["name"], "greet");
        assert_eq!(
            tool["inputSchema"],
            serde_json::json!({
                "type": "object",
                "properties": {"name": {"type": "string", "description": "Who to greet"}},
                "required": ["name"]
            })
        );
    }

    #[actix_web::test]
    async fn tools_call_renders_results_and_failures() {
        let app = app!(state(PartialConfig::default()));

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(call("greet", serde_json::json!({"name": "Ada"})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            response["result"],
            serde_json::json!({"content": [{"type": "text", "text": "hello Ada"}], "isError": false})
        );

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(call("greet", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            response["result"],
            serde_json::json!({"content": [{"type": "text", "text": "name is required"}], "isError": true})
        );

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(call("quiet", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            response["result"],
            serde_json::json!({"content": [], "isError": false})
        );
    }

    #[actix_web::test]
    async fn unknown_tools_and_methods_are_errors() {
        let app = app!(state(PartialConfig::default()));

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(call("nope", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(response["error"]["message"], "Unknown tool: nope");

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call"}))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[actix_web::test]
    async fn headers_override_environment_per_request() {
        let environment = PartialConfig::new(Some("http://env:3000".to_string()), None);
        let app = app!(state(environment));

        let request = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("X-Grafana-API-Key", "abc"))
            .set_json(call("whoami", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["result"]["content"][0]["text"], "http://env:3000 true");

        let request = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("X-Grafana-URL", "https://grafana.example.com/"))
            .set_json(call("whoami", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            response["result"]["content"][0]["text"],
            "https://grafana.example.com false"
        );
    }

    #[actix_web::test]
    async fn invalid_header_url_is_invalid_params() {
        let app = app!(state(PartialConfig::default()));
        let request = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("X-Grafana-URL", "ftp://grafana"))
            .set_json(call("whoami", serde_json::json!({})))
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[actix_web::test]
    async fn parse_errors_and_notifications() {
        let app = app!(state(PartialConfig::default()));

        let request = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let response: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response["error"]["code"], PARSE_ERROR);
        assert_eq!(response["id"], Value::Null);

        let request = test::TestRequest::post()
            .uri("/mcp")
            .set_json(serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn metrics_count_mcp_requests() {
        let app = app!(state(PartialConfig::default()));
        for _ in 0..2 {
            let request = test::TestRequest::post()
                .uri("/mcp")
                .set_json(serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
                .to_request();
            test::call_service(&app, request).await;
        }
        let metrics: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(metrics["requests_total"], 2);
    }

    #[actix_web::test]
    async fn sse_lists_tools() {
        let app = app!(state(PartialConfig::default()));
        let response =
            test::call_service(&app, test::TestRequest::get().uri("/sse").to_request()).await;
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        let body = test::read_body(response).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.contains(r#""count":3"#));
    }

    #[tokio::test]
    async fn stdio_session_uses_environment() {
        let environment = PartialConfig::new(
            Some("http://env:3000".to_string()),
            Some("env-key".to_string()),
        );
        let state = state(environment);
        let registry = registry();
        let session = state.session_context().unwrap();
        assert_eq!(
            session.config(),
            &GrafanaConfig {
                url: "http://env:3000".to_string(),
                api_key: "env-key".to_string(),
            }
        );

        let line = call("whoami", serde_json::json!({})).to_string();
        let response = handle_stdio_line(&state, &registry, &session, &line)
            .await
            .expect("requests get responses");
        let response = serde_json::to_value(response).unwrap();
        assert_eq!(response["result"]["content"][0]["text"], "http://env:3000 true");

        let notification = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(handle_stdio_line(&state, &registry, &session, notification).await.is_none());

        let garbage = handle_stdio_line(&state, &registry, &session, r#"{"id": 7, "method": 1}"#)
            .await
            .expect("parse errors are answered");
        let garbage = serde_json::to_value(garbage).unwrap();
        assert_eq!(garbage["id"], 7);
        assert_eq!(garbage["error"]["code"], PARSE_ERROR);
    }
}
