/// Error Types for Tool Registration and Invocation
///
/// Registration errors surface before a tool becomes callable. Invocation
/// errors are produced per call and never carry a partial result.

use thiserror::Error;

/// A tool could not be registered.
///
/// Handler arity, the execution-context parameter and the `Result` return
/// shape are enforced by trait bounds at compile time; the variants here cover
/// the rules that can only be checked once the parameter schema exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("tool name must not be empty")]
    EmptyName,

    /// The handler's second parameter does not describe a structured record.
    #[error("tool handler second argument must be a struct, found {found}")]
    ParamsNotObject { found: String },

    #[error("required field '{field}' is not a field of the tool arguments")]
    UnknownRequiredField { field: String },

    #[error("tool '{name}' is already registered")]
    DuplicateTool { name: String },
}

/// Classification of an invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationErrorKind {
    Marshal,
    Unmarshal,
    Handler,
    Serialization,
    Panicked,
}

/// A single tool call failed.
///
/// Nothing here is retried by the adapter.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("marshal args: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("unmarshal args: {0}")]
    Unmarshal(#[source] serde_json::Error),

    /// The handler returned an error; the message is kept verbatim.
    #[error("{0}")]
    Handler(String),

    #[error("failed to marshal return value: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("tool handler panicked: {0}")]
    Panicked(String),
}

impl InvocationError {
    pub fn kind(&self) -> InvocationErrorKind {
        match self {
            Self::Marshal(_) => InvocationErrorKind::Marshal,
            Self::Unmarshal(_) => InvocationErrorKind::Unmarshal,
            Self::Handler(_) => InvocationErrorKind::Handler,
            Self::Serialization(_) => InvocationErrorKind::Serialization,
            Self::Panicked(_) => InvocationErrorKind::Panicked,
        }
    }
}

/// A `tools/call` could not be routed or completed.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Backend connection parameters could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid Grafana URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
