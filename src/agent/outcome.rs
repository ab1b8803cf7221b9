//! Final result and failure types of a research run.

use serde::{Deserialize, Serialize};

use super::message::TokenUsage;
use super::source::Source;
use super::step::Step;
use super::tool::ToolKind;
use crate::error::AgentError;

/// Tool invocations per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallCounts {
    /// `web_search` calls.
    pub search: usize,
    /// `extract_content` calls.
    pub extract: usize,
}

impl ToolCallCounts {
    /// Records one attempt of `kind`.
    pub const fn record(&mut self, kind: ToolKind) {
        match kind {
            ToolKind::Search => self.search += 1,
            ToolKind::Extract => self.extract += 1,
        }
    }

    /// Sum over all kinds.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.search + self.extract
    }
}

/// Successful outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Answer text.
    pub final_text: String,
    /// `true` if at least one search step was recorded.
    pub search_performed: bool,
    /// Cited pages, unique by URL in first-seen order.
    pub sources: Vec<Source>,
    /// Research steps in the order they started.
    pub steps: Vec<Step>,
    /// Reasoning iterations executed (synthesis excluded).
    pub iterations_used: usize,
    /// Tool invocations attempted, including failed ones.
    pub tool_calls_used: usize,
    /// Attempts per tool kind.
    pub tool_calls_by_kind: ToolCallCounts,
    /// Times the continuation policy overrode a tool-free answer.
    pub continuations_forced: usize,
    /// `true` if the answer came from a tool-free synthesis pass.
    pub synthesized: bool,
    /// Token usage across every completion of the run.
    pub usage: TokenUsage,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Stable error code returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request was rejected before the loop started.
    InvalidInput,
    /// A provider rate limit was hit.
    RateLimit,
    /// Provider credentials were rejected.
    AuthError,
    /// The model produced an unusable tool call.
    ToolUseFailed,
    /// An external call timed out.
    Timeout,
    /// A provider was unreachable or failed.
    ServiceUnavailable,
    /// The caller cancelled the run.
    Cancelled,
    /// Anything else.
    Unknown,
}

impl ErrorCode {
    /// Wire form of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::ToolUseFailed => "TOOL_USE_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// User-facing message for the code. Internal detail is never included.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::InvalidInput => "The request was invalid.",
            Self::RateLimit => "The service is busy right now. Please try again in a moment.",
            Self::AuthError => "The service is misconfigured. Please contact the administrator.",
            Self::ToolUseFailed => "The assistant could not complete its research. Please rephrase and try again.",
            Self::Timeout => "The request took too long. Please try again.",
            Self::ServiceUnavailable => "A required service is unavailable. Please try again later.",
            Self::Cancelled => "The request was cancelled.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// User-facing message.
    pub error: String,
    /// Stable code.
    pub code: ErrorCode,
}

impl RunFailure {
    /// Failure with the code's canonical message.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            error: code.user_message().to_string(),
            code,
        }
    }

    /// Input rejection, which keeps its specific message.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: ErrorCode::InvalidInput,
        }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for RunFailure {}

impl From<RunFailure> for AgentError {
    fn from(failure: RunFailure) -> Self {
        match failure.code {
            ErrorCode::InvalidInput => Self::InvalidInput {
                message: failure.error,
            },
            ErrorCode::Cancelled => Self::Cancelled,
            code => Self::ApiRequest {
                message: failure.error,
                status: None,
                code: Some(code.as_str().to_string()),
                body: None,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_record() {
        let mut counts = ToolCallCounts::default();
        counts.record(ToolKind::Search);
        counts.record(ToolKind::Search);
        counts.record(ToolKind::Extract);
        assert_eq!(counts.search, 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_error_code_wire_form() {
        for code in [
            ErrorCode::InvalidInput,
            ErrorCode::RateLimit,
            ErrorCode::AuthError,
            ErrorCode::ToolUseFailed,
            ErrorCode::Timeout,
            ErrorCode::ServiceUnavailable,
            ErrorCode::Cancelled,
            ErrorCode::Unknown,
        ] {
            let json = serde_json::to_string(&code).unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_failure_wire_shape() {
        let json = serde_json::to_value(RunFailure::from_code(ErrorCode::RateLimit))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(json["code"], "RATE_LIMIT");
        assert!(json["error"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn test_result_wire_shape() {
        let result = RunResult {
            final_text: "4".to_string(),
            search_performed: false,
            sources: Vec::new(),
            steps: Vec::new(),
            iterations_used: 1,
            tool_calls_used: 0,
            tool_calls_by_kind: ToolCallCounts::default(),
            continuations_forced: 0,
            synthesized: false,
            usage: TokenUsage::default(),
            elapsed_ms: 12,
        };
        let json = serde_json::to_value(&result).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(json["finalText"], "4");
        assert_eq!(json["searchPerformed"], false);
        assert_eq!(json["iterationsUsed"], 1);
        assert_eq!(json["toolCallsByKind"]["search"], 0);
    }
}
