/// MCP Server Entry Point
///
/// Reads process settings and Grafana configuration from the environment,
/// registers the Grafana tools, then starts the selected transport.
///
/// Environment Variables:
/// - SERVER_NAME, SERVER_VERSION: Identity reported to clients
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST, PORT: Bind address for HTTP mode (default: 0.0.0.0:8000)
/// - GRAFANA_URL, GRAFANA_API_KEY: Grafana connection
/// - RUST_LOG: Log filter (default: "info"). Logs are written to stderr.

use mcp_grafana::client;
use mcp_grafana::core::config::PartialConfig;
use mcp_grafana::core::server::{self, AppState};
use mcp_grafana::core::settings::ServerSettings;
use tracing_subscriber::EnvFilter;

fn invalid_input(e: impl std::error::Error + Send + Sync + 'static) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // stdout carries the STDIO protocol stream, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = ServerSettings::from_env().map_err(invalid_input)?;
    let registry = server::initialize_tools().map_err(invalid_input)?;
    let http = client::http_client().map_err(invalid_input)?;
    let state = AppState::new(&settings, PartialConfig::from_env(), http);

    tracing::info!(transport = %settings.transport, "starting");

    if !settings.transport.serves_http() {
        return server::run_server_stdio(state, registry).await;
    }

    // With both transports, STDIO runs in the background so MCP Inspector can
    // attach while the HTTP endpoints stay available
    let stdio_handle = settings.transport.serves_stdio().then(|| {
        let stdio_state = state.clone();
        let stdio_registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_server_stdio(stdio_state, stdio_registry).await {
                tracing::error!(error = %e, "STDIO server error");
            }
        })
    });

    let http_result = server::run_server_http(&settings, state, registry).await;

    // If HTTP server exits, abort STDIO task
    if let Some(handle) = stdio_handle {
        handle.abort();
    }

    http_result
}
