//! Classification of model provider failures and the recovery decision.
//!
//! A failed completion is mapped to a [`ModelFailure`]. The loop then asks
//! [`plan_recovery`] whether to use text salvaged from the failure payload,
//! to synthesize a degraded answer from the tool results gathered so far,
//! or to surface the error.

use std::sync::LazyLock;

use regex::Regex;

use super::outcome::ErrorCode;
use crate::error::AgentError;

/// Classified model provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFailure {
    /// The provider rejected a malformed tool call.
    MalformedToolUse {
        /// Answer text recovered from the failure payload, if any.
        salvaged: Option<String>,
    },
    /// Rate limit hit.
    RateLimited,
    /// Credentials rejected.
    Auth,
    /// Timeout or server-side failure.
    Transient {
        /// `true` when the failure was a deadline.
        timed_out: bool,
    },
    /// The caller cancelled the run.
    Cancelled,
    /// Anything else.
    Unknown,
}

impl ModelFailure {
    /// Stable code reported for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedToolUse { .. } => ErrorCode::ToolUseFailed,
            Self::RateLimited => ErrorCode::RateLimit,
            Self::Auth => ErrorCode::AuthError,
            Self::Transient { timed_out: true } => ErrorCode::Timeout,
            Self::Transient { timed_out: false } => ErrorCode::ServiceUnavailable,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Unknown => ErrorCode::Unknown,
        }
    }
}

/// What the loop does after a model failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Use the salvaged text as the final answer.
    UseSalvaged(String),
    /// Run one tool-free completion over the transcript.
    DegradedSynthesis,
    /// Return the error to the caller.
    Surface,
}

/// Classifies a model provider error by status, provider code, and payload.
#[must_use]
pub fn classify(err: &AgentError) -> ModelFailure {
    match err {
        AgentError::Cancelled => ModelFailure::Cancelled,
        AgentError::Timeout { .. } => ModelFailure::Transient { timed_out: true },
        AgentError::ApiKeyMissing => ModelFailure::Auth,
        AgentError::ApiRequest {
            message,
            status,
            code,
            body,
        } => {
            let code = code.as_deref().unwrap_or_default();
            let haystack = body.as_deref().unwrap_or(message.as_str());
            if *status == Some(429) || code == "rate_limit_exceeded" {
                ModelFailure::RateLimited
            } else if matches!(status, Some(401 | 403)) || code == "invalid_api_key" {
                ModelFailure::Auth
            } else if code == "tool_use_failed"
                || haystack.contains("tool_use_failed")
                || haystack.contains("failed_generation")
            {
                ModelFailure::MalformedToolUse {
                    salvaged: salvage_text(haystack),
                }
            } else if matches!(status, Some(408 | 500..=599)) {
                ModelFailure::Transient { timed_out: *status == Some(408) }
            } else if status.is_none() && code.is_empty() {
                // No HTTP response at all: connection-level failure.
                ModelFailure::Transient { timed_out: false }
            } else {
                ModelFailure::Unknown
            }
        }
        _ => ModelFailure::Unknown,
    }
}

static FAILED_GENERATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#""failed_generation"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()
});

static FUNCTION_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<function=[^>]*>.*?(?:</function>|$)").ok());

/// Recovers answer text from a malformed tool call's failure payload.
///
/// Returns `None` when the payload carries no `failed_generation` or when
/// nothing but a function-call fragment remains after cleanup.
#[must_use]
pub fn salvage_text(payload: &str) -> Option<String> {
    let raw = FAILED_GENERATION
        .as_ref()?
        .captures(payload)?
        .get(1)?
        .as_str();
    let unescaped: String = serde_json::from_str(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string());
    let cleaned = FUNCTION_TAG
        .as_ref()
        .map_or_else(|| unescaped.clone(), |re| re.replace_all(&unescaped, "").into_owned());
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Chooses the recovery path for a classified failure.
#[must_use]
pub fn plan_recovery(failure: &ModelFailure, successful_tool_calls: usize) -> Recovery {
    match failure {
        ModelFailure::Cancelled => Recovery::Surface,
        ModelFailure::MalformedToolUse {
            salvaged: Some(text),
        } => Recovery::UseSalvaged(text.clone()),
        _ if successful_tool_calls > 0 => Recovery::DegradedSynthesis,
        _ => Recovery::Surface,
    }
}
