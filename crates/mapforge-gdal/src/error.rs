//! Error types for mapforge-gdal.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can terminate a conversion job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The job request is malformed. Raised before any process is launched.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A configured executable does not exist.
    #[error("tool not found: {tool} (expected at {})", path.display())]
    ToolNotFound { tool: String, path: PathBuf },

    /// An external tool exited with a non-zero status.
    #[error("{tool} failed ({}){}", exit_label(*exit_code), trailing(output))]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The job was cancelled and its child process terminated.
    #[error("cancelled")]
    Cancelled,

    /// Any other launch or I/O failure.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn trailing(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{}", output)
    }
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            path: path.into(),
        }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(
        tool: impl Into<String>,
        exit_code: Option<i32>,
        output: impl Into<String>,
    ) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            exit_code,
            output: output.into(),
        }
    }

    /// Short machine-readable name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::ToolNotFound { .. } => "tool_not_found",
            Error::ToolFailed { .. } => "tool_execution",
            Error::Cancelled => "cancelled",
            Error::Unexpected(_) => "unexpected",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}
