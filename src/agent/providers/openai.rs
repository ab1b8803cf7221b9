//! `OpenAI`-compatible chat completions provider.
//!
//! Request and response bodies use the `async-openai` types; transport is
//! a plain `reqwest` client. Each completion is sent exactly once (rate
//! limits surface immediately as HTTP 429) and error responses keep their
//! raw JSON body, which carries `failed_generation` on Groq-style
//! malformed tool calls.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Groq, local proxies)
//! via the base URL override in [`AgentConfig`].

use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionNamedToolChoice,
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestToolMessage,
    ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionTool, ChatCompletionToolChoiceOption,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionResponse,
    FunctionCall, FunctionName, FunctionObject,
};
use async_trait::async_trait;
use serde::Deserialize;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage, ToolChoice};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::ToolCall;
use crate::error::AgentError;

/// Default API base when no override is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI`-compatible LLM provider.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Error envelope shared by `OpenAI`-compatible APIs.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(config.model_timeout)
            .build()
            .map_err(|e| AgentError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url,
        })
    }

    async fn create(
        &self,
        request: &CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, AgentError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), model = %request.model, "completion request failed");
            return Err(map_status(status.as_u16(), body));
        }
        response
            .json::<CreateChatCompletionResponse>()
            .await
            .map_err(map_transport_error)
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    ))
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Maps our tool directive onto the SDK option.
    fn convert_tool_choice(choice: &ToolChoice) -> ChatCompletionToolChoiceOption {
        match choice {
            ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
            ToolChoice::None => ChatCompletionToolChoiceOption::None,
            ToolChoice::Forced(name) => {
                ChatCompletionToolChoiceOption::Named(ChatCompletionNamedToolChoice {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionName { name: name.clone() },
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    ///
    /// `tool_choice` is only sent alongside tools; some compatible APIs
    /// reject a directive with an empty tool list.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let (tools, tool_choice) = if request.tools.is_empty() {
            (None, None)
        } else {
            let tools = request
                .tools
                .iter()
                .map(|td| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: td.name.clone(),
                        description: Some(td.description.clone()),
                        parameters: Some(td.parameters.clone()),
                        strict: None,
                    },
                })
                .collect();
            (
                Some(tools),
                Some(Self::convert_tool_choice(&request.tool_choice)),
            )
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            tools,
            tool_choice,
            ..Default::default()
        }
    }
}

fn unquote(value: &impl ToString) -> String {
    value.to_string().trim_matches('"').to_string()
}

/// Converts an error response into [`AgentError::ApiRequest`].
///
/// The raw body is kept verbatim for failure classification.
fn map_status(status: u16, body: String) -> AgentError {
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .map(|envelope| envelope.error);
    let code = detail
        .as_ref()
        .and_then(|d| d.code.as_ref())
        .filter(|c| !c.is_null())
        .map(unquote)
        .filter(|c| !c.is_empty());
    let message = match detail {
        Some(d) if !d.message.is_empty() => d.message,
        _ if body.trim().is_empty() => format!("HTTP {status}"),
        _ => format!("HTTP {status}: {}", body.trim()),
    };
    AgentError::ApiRequest {
        message,
        status: Some(status),
        code,
        body: (!body.trim().is_empty()).then_some(body),
    }
}

fn map_transport_error(e: reqwest::Error) -> AgentError {
    AgentError::ApiRequest {
        message: e.to_string(),
        status: if e.is_timeout() {
            Some(408)
        } else {
            e.status().map(|s| s.as_u16())
        },
        code: None,
        body: None,
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self.create(&openai_request).await?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .and_then(|fr| serde_json::to_value(fr).ok())
            .and_then(|v| v.as_str().map(str::to_string));

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolSet;

    fn request(tools: &ToolSet, tool_choice: ToolChoice) -> ChatRequest {
        ChatRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.3),
            max_tokens: Some(100),
            tools: tools.definitions().to_vec(),
            tool_choice,
        }
    }

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_tool_message() {
        let msg = message::tool_message("call_123", "result data");
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Tool(t) = converted {
            assert_eq!(t.tool_call_id, "call_123");
        } else {
            panic!("Expected Tool message");
        }
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_tool_calls_message(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "web_search".to_string(),
                arguments: r#"{"query":"rust"}"#.to_string(),
            }],
        );
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert!(a.content.is_none());
            let tcs = a.tool_calls.as_ref().map_or(0, Vec::len);
            assert_eq!(tcs, 1);
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    fn test_build_request_forced_tool() {
        let built = OpenAiProvider::build_request(&request(
            &ToolSet::research_tools(),
            ToolChoice::Forced("web_search".to_string()),
        ));
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 2);
        match built.tool_choice {
            Some(ChatCompletionToolChoiceOption::Named(named)) => {
                assert_eq!(named.function.name, "web_search");
            }
            other => panic!("unexpected tool choice: {other:?}"),
        }
    }

    #[test]
    fn test_build_request_without_tools_omits_choice() {
        let built = OpenAiProvider::build_request(&request(&ToolSet::none(), ToolChoice::None));
        assert!(built.tools.is_none());
        assert!(built.tool_choice.is_none());
    }

    #[test]
    fn test_build_request_auto() {
        let built =
            OpenAiProvider::build_request(&request(&ToolSet::research_tools(), ToolChoice::Auto));
        assert!(matches!(
            built.tool_choice,
            Some(ChatCompletionToolChoiceOption::Auto)
        ));
        assert_eq!(built.max_completion_tokens, Some(100));
    }

    const GROQ_TOOL_USE_FAILED: &str = r#"{"error":{"message":"Failed to call a function. Please adjust your prompt. See 'failed_generation' for more details.","type":"invalid_request_error","code":"tool_use_failed","failed_generation":"Rust 1.88 stabilized let chains. <function=web_search>{\"query\": \"rust\"}</function>"}}"#;

    #[test]
    fn test_map_status_keeps_raw_body() {
        match map_status(400, GROQ_TOOL_USE_FAILED.to_string()) {
            AgentError::ApiRequest {
                message,
                status,
                code,
                body,
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(code.as_deref(), Some("tool_use_failed"));
                assert!(message.starts_with("Failed to call a function"));
                assert!(body.is_some_and(|b| b.contains("failed_generation")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_map_status_non_json_body() {
        match map_status(502, "<html>Bad Gateway</html>".to_string()) {
            AgentError::ApiRequest {
                message,
                status,
                code,
                ..
            } => {
                assert_eq!(status, Some(502));
                assert!(code.is_none());
                assert_eq!(message, "HTTP 502: <html>Bad Gateway</html>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_map_status_null_code() {
        let body = r#"{"error":{"message":"Internal error","type":"server_error","code":null}}"#;
        match map_status(500, body.to_string()) {
            AgentError::ApiRequest { code, message, .. } => {
                assert!(code.is_none());
                assert_eq!(message, "Internal error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AgentConfig::builder()
            .api_key("sk-secret")
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        let provider = OpenAiProvider::new(&config).unwrap_or_else(|e| panic!("{e}"));
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains(DEFAULT_BASE_URL));
    }

    #[cfg(feature = "server")]
    mod upstream {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        use axum::http::{StatusCode, header};

        use super::*;
        use crate::agent::outcome::ErrorCode;
        use crate::agent::recovery::{ModelFailure, classify};

        const RATE_LIMITED: &str = r#"{"error":{"message":"Rate limit reached for model","type":"requests","code":"rate_limit_exceeded"}}"#;

        /// Serves one canned chat completions reply and counts requests.
        async fn spawn_upstream(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            let app = axum::Router::new().route(
                "/chat/completions",
                axum::routing::post(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let status =
                            StatusCode::from_u16(status).unwrap_or_else(|e| panic!("{e}"));
                        (status, [(header::CONTENT_TYPE, "application/json")], body)
                    }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .unwrap_or_else(|e| panic!("{e}"));
            let addr = listener.local_addr().unwrap_or_else(|e| panic!("{e}"));
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            (format!("http://{addr}/"), hits)
        }

        fn provider(base_url: &str) -> OpenAiProvider {
            let config = AgentConfig::builder()
                .api_key("sk-test")
                .base_url(base_url)
                .build()
                .unwrap_or_else(|e| panic!("{e}"));
            OpenAiProvider::new(&config).unwrap_or_else(|e| panic!("{e}"))
        }

        async fn chat_error(base_url: &str) -> AgentError {
            let request = request(&ToolSet::research_tools(), ToolChoice::Auto);
            let result = tokio::time::timeout(
                Duration::from_secs(5),
                provider(base_url).chat(&request),
            )
            .await
            .unwrap_or_else(|_| panic!("completion request was retried instead of failing"));
            match result {
                Err(e) => e,
                Ok(response) => panic!("expected an error, got {response:?}"),
            }
        }

        #[tokio::test]
        async fn test_rate_limit_fails_fast() {
            let (base, hits) = spawn_upstream(429, RATE_LIMITED).await;
            let err = chat_error(&base).await;

            assert_eq!(hits.load(Ordering::SeqCst), 1);
            assert!(matches!(
                err,
                AgentError::ApiRequest {
                    status: Some(429),
                    ..
                }
            ));
            assert_eq!(classify(&err), ModelFailure::RateLimited);
            assert_eq!(classify(&err).code(), ErrorCode::RateLimit);
        }

        #[tokio::test]
        async fn test_failed_generation_is_salvageable() {
            let (base, _) = spawn_upstream(400, GROQ_TOOL_USE_FAILED).await;
            let err = chat_error(&base).await;

            match classify(&err) {
                ModelFailure::MalformedToolUse { salvaged } => {
                    assert_eq!(salvaged.as_deref(), Some("Rust 1.88 stabilized let chains."));
                }
                other => panic!("unexpected classification: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_tool_call_response() {
            let body = r#"{
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4.1-mini",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "web_search", "arguments": "{\"query\":\"rust\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
            }"#;
            let (base, _) = spawn_upstream(200, body).await;
            let request = request(&ToolSet::research_tools(), ToolChoice::Auto);
            let response = provider(&base)
                .chat(&request)
                .await
                .unwrap_or_else(|e| panic!("{e}"));

            assert!(response.content.is_empty());
            assert_eq!(response.tool_calls.len(), 1);
            assert_eq!(response.tool_calls[0].name, "web_search");
            assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
            assert_eq!(response.usage.total_tokens, 19);
        }
    }
}
