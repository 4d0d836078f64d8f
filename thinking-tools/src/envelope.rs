//! Tool response envelope
//!
//! Every tool on every server answers with a single JSON document:
//!
//! ```json
//! {"status": "success", "result": { ... }}
//! {"status": "error", "error": "rate_limited", "message": "...", "details": { ... }}
//! ```
//!
//! Domain error enums implement [`ToolFailure`] so they can be rendered into
//! the error form without each server hand-building JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// An error that knows how to describe itself in the envelope.
pub trait ToolFailure: std::error::Error {
    /// Machine-readable, snake_case error kind (e.g. `rate_limited`).
    fn kind(&self) -> &'static str;

    /// Structured context for the caller, if any.
    fn details(&self) -> Option<Value> {
        None
    }

    /// Human-readable message. Defaults to the `Display` output.
    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Success or error document returned by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    Success {
        result: Value,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl Envelope {
    /// Wrap a serializable result.
    ///
    /// A result that fails to serialize becomes an `internal_error` envelope.
    pub fn success<T: Serialize>(result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Envelope::Success { result },
            Err(e) => Envelope::failure(&DispatchError::internal(e.to_string())),
        }
    }

    /// Render a domain error.
    pub fn failure<E: ToolFailure + ?Sized>(err: &E) -> Self {
        Envelope::Error {
            error: err.kind().to_string(),
            message: err.message(),
            details: err.details(),
        }
    }

    pub fn from_result<T: Serialize, E: ToolFailure>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Envelope::success(&value),
            Err(e) => Envelope::failure(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    /// The success payload, if this is a success envelope.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Envelope::Success { result } => Some(result),
            Envelope::Error { .. } => None,
        }
    }

    /// The error kind, if this is an error envelope.
    pub fn error_kind(&self) -> Option<&str> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Error { error, .. } => Some(error.as_str()),
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Error { details, .. } => details.as_ref(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            json!({"status": "error", "error": "internal_error", "message": e.to_string()})
                .to_string()
        })
    }

    /// Convert into the shape the MCP tool router expects.
    ///
    /// Error envelopes travel on the `Err` side so hosts see `isError: true`;
    /// the body is the same JSON document either way.
    pub fn into_tool_result(self) -> Result<String, String> {
        let text = self.to_json();
        if self.is_success() {
            Ok(text)
        } else {
            Err(text)
        }
    }
}

/// Failures raised at the dispatch boundary, before a tool body runs.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ToolFailure for DispatchError {
    fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Internal { .. } => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::UnknownTool { name } => Some(json!({ "tool": name })),
            Self::InvalidArguments { tool, .. } => Some(json!({ "tool": tool })),
            Self::Internal { .. } => None,
        }
    }

    fn message(&self) -> Option<String> {
        match self {
            Self::UnknownTool { .. } => None,
            _ => Some(self.to_string()),
        }
    }
}

/// Deserialize tool arguments, treating a missing/null payload as `{}`.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, DispatchError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| DispatchError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
