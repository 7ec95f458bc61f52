/// Process Settings
///
/// Server identity, transport selection and HTTP binding, read from
/// environment variables with defaults:
///
/// - SERVER_NAME: Name reported to clients (default: "mcp-grafana")
/// - SERVER_VERSION: Version reported to clients (default: the crate version)
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 8000)
/// - WORKER_THREADS: HTTP worker count (default: CPU count, at most 16)
///
/// Grafana connection settings live in `core::config`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_SERVER_NAME: &str = "mcp-grafana";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
const MAX_DEFAULT_WORKERS: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid transport mode '{0}', must be 'stdio', 'http', or 'both'")]
    InvalidTransport(String),
}

/// Which transports to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    Stdio,
    Http,
    #[default]
    Both,
}

impl TransportMode {
    pub fn serves_stdio(self) -> bool {
        matches!(self, Self::Stdio | Self::Both)
    }

    pub fn serves_http(self) -> bool {
        matches!(self, Self::Http | Self::Both)
    }
}

impl FromStr for TransportMode {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "both" => Ok(Self::Both),
            _ => Err(SettingsError::InvalidTransport(value.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Both => "both",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub name: String,
    pub version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    ///
    /// Unparsable numbers fall back to their defaults; an unknown transport
    /// mode is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = match lookup("MCP_TRANSPORT_MODE") {
            Some(mode) => mode.parse()?,
            None => TransportMode::default(),
        };
        let workers = lookup("WORKER_THREADS")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|&workers| workers > 0)
            .unwrap_or_else(|| num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS));

        Ok(Self {
            name: lookup("SERVER_NAME").unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            version: lookup("SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            transport,
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup("PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            workers,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
