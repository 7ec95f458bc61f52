/// Core Server Framework Module
///
/// This module contains the tool adapter and server implementation:
/// - schema.rs: Input schema derivation from parameter types
/// - tool.rs: Adapter turning typed async handlers into uniform tools
/// - output.rs: Tool result shapes and their normalization
/// - registry.rs: Named tool collection and dispatch
/// - context.rs: Per-request and per-call handler context
/// - config.rs: Grafana connection configuration from environment and headers
/// - settings.rs: Process settings (transport, bind address, workers)
/// - server.rs: MCP server implementation with HTTP and STDIO transport
/// - error.rs: Registration, invocation and configuration errors

pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod registry;
pub mod schema;
pub mod server;
pub mod settings;
pub mod tool;
