//! Agent configuration with builder pattern and environment variable support.
//!
//! Two layers:
//! - [`AgentConfig`]: process-level settings (keys, model, timeouts), resolved
//!   in order: explicit values → environment variables → defaults.
//! - [`RunConfig`]: per-run policy (iteration budget, continuation threshold,
//!   enabled tools), immutable for the lifetime of one run.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::tool::{MAX_SEARCH_RESULTS, SearchDepth, ToolKind};
use crate::error::AgentError;

/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
/// Default max tokens per completion.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default model completion timeout in seconds.
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
/// Default per-tool-call timeout in seconds.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
/// Default keep-alive interval in seconds.
const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

/// Configuration for the agent system.
#[derive(Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the model provider.
    pub api_key: String,
    /// Optional base URL override (for Groq, proxies, or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for every completion in a run.
    pub model: String,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// API key for the search/extract backend.
    pub search_api_key: Option<String>,
    /// Deadline for a single model completion.
    pub model_timeout: Duration,
    /// Deadline for a single tool call.
    pub tool_timeout: Duration,
    /// How often the progress sink is pinged while awaiting an external call.
    pub keep_alive_interval: Duration,
    /// Directory containing prompt template files.
    ///
    /// When set, prompts are loaded from markdown files in this directory,
    /// falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("model_timeout", &self.model_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("prompt_dir", &self.prompt_dir)
            .finish()
    }
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    search_api_key: Option<String>,
    model_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    keep_alive_interval: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("SLEUTH_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("SLEUTH_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("SLEUTH_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("SLEUTH_MODEL").ok();
        }
        if self.search_api_key.is_none() {
            self.search_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.model_timeout.is_none() {
            self.model_timeout = env_secs("SLEUTH_MODEL_TIMEOUT_SECS");
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout = env_secs("SLEUTH_TOOL_TIMEOUT_SECS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("SLEUTH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the model API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the max tokens per completion.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the search backend API key.
    #[must_use]
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Sets the model completion timeout.
    #[must_use]
    pub const fn model_timeout(mut self, duration: Duration) -> Self {
        self.model_timeout = Some(duration);
        self
    }

    /// Sets the per-tool-call timeout.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub const fn keep_alive_interval(mut self, duration: Duration) -> Self {
        self.keep_alive_interval = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::Config`] if a timeout is zero.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let model_timeout = self
            .model_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS));
        let tool_timeout = self
            .tool_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS));
        let keep_alive_interval = self
            .keep_alive_interval
            .unwrap_or(Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS));
        if model_timeout.is_zero() || tool_timeout.is_zero() || keep_alive_interval.is_zero() {
            return Err(AgentError::Config {
                message: "timeouts and keep-alive interval must be non-zero".to_string(),
            });
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            search_api_key: self.search_api_key,
            model_timeout,
            tool_timeout,
            keep_alive_interval,
            prompt_dir: self.prompt_dir,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-run configuration
// ---------------------------------------------------------------------------

/// Research mode of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    /// Answer directly when possible, search when needed.
    #[default]
    Standard,
    /// Investigate several angles before answering.
    Deep,
}

/// When a tool-free answer is allowed to end the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationPolicy {
    /// Tool invocations required before a deep run may stop.
    pub min_tool_calls: usize,
}

/// Policy for one run of the research loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Standard or deep research.
    pub mode: ResearchMode,
    /// Reasoning iterations allowed (synthesis is not counted).
    pub max_iterations: usize,
    /// Force `web_search` on the first iteration.
    pub force_tool_on_first_step: bool,
    /// Tools offered to the model.
    pub tools_enabled: BTreeSet<ToolKind>,
    /// Forced-continuation threshold.
    pub continuation: ContinuationPolicy,
    /// Sampling temperature.
    pub temperature: f32,
    /// Default depth for searches that do not specify one.
    pub search_depth: SearchDepth,
    /// Default result count for searches that do not specify one.
    pub max_search_results: usize,
    /// Pre-supplied retrieved text. When non-empty, no tools are offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RunConfig {
    /// Standard mode: up to 5 iterations, no minimum investigation.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            mode: ResearchMode::Standard,
            max_iterations: 5,
            force_tool_on_first_step: false,
            tools_enabled: ToolKind::ALL.into_iter().collect(),
            continuation: ContinuationPolicy { min_tool_calls: 0 },
            temperature: 0.3,
            search_depth: SearchDepth::Basic,
            max_search_results: 5,
            context: None,
        }
    }

    /// Deep mode: up to 12 iterations, at least 4 tool calls, search first.
    #[must_use]
    pub fn deep() -> Self {
        Self {
            mode: ResearchMode::Deep,
            max_iterations: 12,
            force_tool_on_first_step: true,
            tools_enabled: ToolKind::ALL.into_iter().collect(),
            continuation: ContinuationPolicy { min_tool_calls: 4 },
            temperature: 0.3,
            search_depth: SearchDepth::Advanced,
            max_search_results: 8,
            context: None,
        }
    }

    /// Preset for a mode.
    #[must_use]
    pub fn for_mode(mode: ResearchMode) -> Self {
        match mode {
            ResearchMode::Standard => Self::standard(),
            ResearchMode::Deep => Self::deep(),
        }
    }

    /// Sets the iteration budget.
    #[must_use]
    pub const fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Sets the forced-continuation threshold.
    #[must_use]
    pub const fn with_min_tool_calls(mut self, n: usize) -> Self {
        self.continuation.min_tool_calls = n;
        self
    }

    /// Attaches pre-supplied context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the context when it is non-blank.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Returns `true` in deep mode.
    #[must_use]
    pub const fn is_deep(&self) -> bool {
        matches!(self.mode, ResearchMode::Deep)
    }

    /// Result count used when a search call does not pick one.
    #[must_use]
    pub fn default_search_results(&self) -> usize {
        self.max_search_results.clamp(1, MAX_SEARCH_RESULTS)
    }

    /// Checks the run policy before the loop starts.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidInput`] when the iteration budget is zero.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_iterations == 0 {
            return Err(AgentError::InvalidInput {
                message: "max_iterations must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(
            config.model_timeout,
            Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS)
        );
        assert!(config.search_api_key.is_none());
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = AgentConfig::builder()
            .api_key("k")
            .tool_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .model("llama-3.3-70b-versatile")
            .base_url("https://api.groq.com/openai/v1")
            .search_api_key("tvly-key")
            .tool_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(config.search_api_key.as_deref(), Some("tvly-key"));
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = AgentConfig::builder()
            .api_key("sk-secret")
            .search_api_key("tvly-secret")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("tvly-secret"));
    }

    #[test]
    fn test_run_presets() {
        let standard = RunConfig::standard();
        assert!(!standard.is_deep());
        assert_eq!(standard.continuation.min_tool_calls, 0);
        assert!(!standard.force_tool_on_first_step);

        let deep = RunConfig::deep();
        assert!(deep.is_deep());
        assert_eq!(deep.continuation.min_tool_calls, 4);
        assert!(deep.force_tool_on_first_step);
        assert!(deep.max_iterations > standard.max_iterations);
    }

    #[test]
    fn test_blank_context_ignored() {
        let config = RunConfig::standard().with_context("   ");
        assert!(config.context().is_none());
        let config = RunConfig::standard().with_context("facts");
        assert_eq!(config.context(), Some("facts"));
    }

    #[test]
    fn test_validate_zero_iterations() {
        assert!(RunConfig::standard().with_max_iterations(0).validate().is_err());
        assert!(RunConfig::deep().validate().is_ok());
    }
}
