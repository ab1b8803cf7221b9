//! HTTP request body types.
//!
//! Translates the JSON chat body, including the legacy `deepResearch`
//! boolean form, into an explicit [`RunConfig`].

use serde::{Deserialize, Serialize};

use crate::agent::config::{ResearchMode, RunConfig};
use crate::agent::message::ChatMessage;

/// Upper bound on a caller-supplied iteration budget.
pub const MAX_REQUEST_ITERATIONS: usize = 20;

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    /// The user's question.
    pub message: String,

    /// Prior conversation turns.
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Pre-supplied context; disables web tools when non-blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Deep research toggle, either a bare flag or an options object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_research: Option<DeepResearch>,
}

/// `deepResearch` field: `true`/`false` or `{enabled, maxIterations?, minToolCalls?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeepResearch {
    /// Legacy boolean form.
    Flag(bool),
    /// Options object.
    Options(DeepResearchOptions),
}

/// Options object form of `deepResearch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepResearchOptions {
    /// Whether deep mode is on.
    #[serde(default)]
    pub enabled: bool,
    /// Iteration budget override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    /// Continuation threshold override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tool_calls: Option<usize>,
}

impl ChatParams {
    /// Builds the run policy for this request.
    ///
    /// Overrides apply to either mode. Iteration budgets above
    /// [`MAX_REQUEST_ITERATIONS`] are capped; a zero budget is passed through
    /// so the orchestrator rejects it as invalid input.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        let options = match &self.deep_research {
            None => DeepResearchOptions::default(),
            Some(DeepResearch::Flag(enabled)) => DeepResearchOptions {
                enabled: *enabled,
                ..DeepResearchOptions::default()
            },
            Some(DeepResearch::Options(options)) => options.clone(),
        };

        let mode = if options.enabled {
            ResearchMode::Deep
        } else {
            ResearchMode::Standard
        };
        let mut config = RunConfig::for_mode(mode);

        if let Some(n) = options.max_iterations {
            config = config.with_max_iterations(n.min(MAX_REQUEST_ITERATIONS));
        }
        if let Some(n) = options.min_tool_calls {
            config = config.with_min_tool_calls(n);
        }
        if let Some(context) = &self.context {
            config = config.with_context(context.clone());
        }
        config
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::Role;

    fn parse(json: &str) -> ChatParams {
        serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_minimal_body_is_standard() {
        let params = parse(r#"{"message": "hi"}"#);
        assert!(params.history.is_empty());
        assert_eq!(params.run_config(), RunConfig::standard());
    }

    #[test]
    fn test_legacy_boolean_flag() {
        let params = parse(r#"{"message": "hi", "deepResearch": true}"#);
        assert_eq!(params.run_config(), RunConfig::deep());

        let params = parse(r#"{"message": "hi", "deepResearch": false}"#);
        assert_eq!(params.run_config(), RunConfig::standard());
    }

    #[test]
    fn test_options_object() {
        let params = parse(
            r#"{"message": "hi", "deepResearch": {"enabled": true, "maxIterations": 50, "minToolCalls": 2}}"#,
        );
        let config = params.run_config();
        assert!(config.is_deep());
        assert_eq!(config.max_iterations, MAX_REQUEST_ITERATIONS);
        assert_eq!(config.continuation.min_tool_calls, 2);
    }

    #[test]
    fn test_zero_iterations_passes_through() {
        let params = parse(r#"{"message": "hi", "deepResearch": {"maxIterations": 0}}"#);
        let config = params.run_config();
        assert!(!config.is_deep());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_and_context() {
        let params = parse(
            r#"{
                "message": "and then?",
                "history": [
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "answer"}
                ],
                "context": "Internal memo text"
            }"#,
        );
        assert_eq!(params.history.len(), 2);
        assert_eq!(params.history[1].role, Role::Assistant);
        assert_eq!(params.run_config().context(), Some("Internal memo text"));
    }
}
