//! Provider registry and factories.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations and
//! builds the tool executor from configuration.

use std::sync::Arc;

use crate::agent::backends::TavilyClient;
use crate::agent::config::AgentConfig;
use crate::agent::executor::ToolExecutor;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): `OpenAI`-compatible chat completions APIs
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names,
/// or [`AgentError::Config`] if the HTTP client cannot be built.
pub fn create_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Creates a [`ToolExecutor`] backed by Tavily.
///
/// # Errors
///
/// Returns [`AgentError::SearchKeyMissing`] if no search key is configured.
pub fn create_executor(config: &AgentConfig) -> Result<ToolExecutor, AgentError> {
    let key = config
        .search_api_key
        .as_deref()
        .ok_or(AgentError::SearchKeyMissing)?;
    let tavily = Arc::new(TavilyClient::new(key, config.tool_timeout)?);
    Ok(ToolExecutor::new(
        tavily.clone(),
        tavily,
        config.tool_timeout,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("openai")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap_or_else(|_| unreachable!()).name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("unknown")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_provider(&config);
        assert!(matches!(
            result,
            Err(AgentError::UnsupportedProvider { .. })
        ));
    }

    #[test]
    fn test_create_executor_requires_search_key() {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            create_executor(&config),
            Err(AgentError::SearchKeyMissing)
        ));

        let config = AgentConfig::builder()
            .api_key("test")
            .search_api_key("tvly-test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(create_executor(&config).is_ok());
    }
}
