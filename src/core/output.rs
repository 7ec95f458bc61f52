/// Tool Results and Return Value Normalization
///
/// Handlers return whatever is natural for them: a `String`, an
/// `Option<...>`, a `Json<T>` wrapping any serializable value, a raw
/// `serde_json::Value`, or a fully built `CallToolResult`. `IntoToolOutput`
/// maps each of those onto `ToolOutput`, which in turn becomes the MCP
/// `tools/call` result or nothing at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One content item of a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// MCP `tools/call` result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful result holding a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// A failed call reported in-band, with the error message as its only item.
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
        }
    }
}

/// Canonical shape of a handler's return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Nothing to report.
    Absent,
    /// The handler built the envelope itself.
    Envelope(CallToolResult),
    /// Text returned verbatim. Empty text counts as absent.
    Text(String),
    /// Serialized form of an arbitrary value.
    Structured(String),
}

impl ToolOutput {
    pub fn into_result(self) -> Option<CallToolResult> {
        match self {
            Self::Absent => None,
            Self::Envelope(result) => Some(result),
            Self::Text(text) if text.is_empty() => None,
            Self::Text(text) | Self::Structured(text) => Some(CallToolResult::text(text)),
        }
    }
}

/// Conversion from a handler's success value into a `ToolOutput`.
///
/// Only serialization of structured values can fail.
pub trait IntoToolOutput {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error>;
}

/// Marks a return value to be serialized as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl IntoToolOutput for ToolOutput {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        Ok(self)
    }
}

impl IntoToolOutput for CallToolResult {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        Ok(ToolOutput::Envelope(self))
    }
}

impl IntoToolOutput for String {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        Ok(ToolOutput::Text(self))
    }
}

impl IntoToolOutput for &'static str {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        Ok(ToolOutput::Text(self.to_string()))
    }
}

impl IntoToolOutput for () {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        Ok(ToolOutput::Absent)
    }
}

impl<T: IntoToolOutput> IntoToolOutput for Option<T> {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        match self {
            Some(value) => value.into_tool_output(),
            None => Ok(ToolOutput::Absent),
        }
    }
}

impl<T: IntoToolOutput> IntoToolOutput for Box<T> {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        (*self).into_tool_output()
    }
}

impl IntoToolOutput for Value {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        match self {
            Value::Null => Ok(ToolOutput::Absent),
            Value::String(text) => Ok(ToolOutput::Text(text)),
            other => serde_json::to_string(&other).map(ToolOutput::Structured),
        }
    }
}

impl<T: Serialize> IntoToolOutput for Json<T> {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        let text = serde_json::to_string(&self.0)?;
        if text == "null" {
            return Ok(ToolOutput::Absent);
        }
        Ok(ToolOutput::Structured(text))
    }
}

impl<T: Serialize> IntoToolOutput for Vec<T> {
    fn into_tool_output(self) -> Result<ToolOutput, serde_json::Error> {
        serde_json::to_string(&self).map(ToolOutput::Structured)
    }
}
