//! Error types for sleuth.
//!
//! [`AgentError`] covers everything the research loop and its providers can
//! raise. [`CommandError`] is the CLI layer. Both fold into the top-level
//! [`Error`] used by the crate [`Result`] alias.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Research loop or provider failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised by the agent system.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured for the model provider.
    #[error("model API key not configured (set OPENAI_API_KEY or SLEUTH_API_KEY)")]
    ApiKeyMissing,

    /// No API key configured for the search/extract backend.
    #[error("search API key not configured (set TAVILY_API_KEY)")]
    SearchKeyMissing,

    /// Provider name not recognised by the factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The requested provider name.
        name: String,
    },

    /// The model provider rejected or failed a request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when the transport exposed one.
        status: Option<u16>,
        /// Provider-specific error code (e.g. `rate_limit_exceeded`).
        code: Option<String>,
        /// Raw failure payload, when available.
        body: Option<String>,
    },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// What was being awaited.
        operation: &'static str,
        /// The deadline that elapsed.
        seconds: u64,
    },

    /// The run was cancelled by its caller.
    #[error("run cancelled")]
    Cancelled,

    /// A tool handler failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Tool arguments could not be parsed or validated.
    #[error("invalid arguments for tool '{name}': {message}")]
    ToolArguments {
        /// Tool name.
        name: String,
        /// Parse or validation failure.
        message: String,
    },

    /// The request was rejected before the loop started.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input.
        message: String,
    },

    /// Configuration could not be resolved.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// A command-line argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_display() {
        let err = AgentError::ApiRequest {
            message: "slow down".to_string(),
            status: Some(429),
            code: Some("rate_limit_exceeded".to_string()),
            body: None,
        };
        assert_eq!(err.to_string(), "API request failed: slow down");
    }

    #[test]
    fn test_timeout_display() {
        let err = AgentError::Timeout {
            operation: "model completion",
            seconds: 60,
        };
        assert_eq!(err.to_string(), "model completion timed out after 60s");
    }

    #[test]
    fn test_error_from_agent_error() {
        let err: Error = AgentError::Cancelled.into();
        assert!(matches!(err, Error::Agent(AgentError::Cancelled)));
        assert_eq!(err.to_string(), "run cancelled");
    }
}
