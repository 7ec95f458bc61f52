/// Grafana MCP server library.
///
/// Exposes Grafana operations (dashboard search, datasources, Prometheus,
/// Loki and Grafana Incident) as MCP tools. Tools are plain async functions
/// over typed parameter structs; `core::tool::ToolAdapter` derives their input
/// schema and adapts them to the uniform JSON call interface.

pub mod client;
pub mod core;
pub mod tools;
