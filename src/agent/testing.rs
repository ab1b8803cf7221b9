//! In-memory doubles shared by the agent unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::backends::{
    BackendError, ExtractBackend, ExtractResponse, ExtractedPage, SearchBackend, SearchHit,
    SearchRequest, SearchResponse,
};
use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::progress::{EventKind, ProgressEvent, ProgressSink, SinkError};
use super::provider::LlmProvider;
use super::tool::ToolCall;
use crate::error::AgentError;

/// Provider that replays a fixed script of responses and records requests.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, AgentError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ChatResponse, AgentError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::ApiRequest {
                    message: "script exhausted".to_string(),
                    status: Some(500),
                    code: None,
                    body: None,
                })
            })
    }
}

fn usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A tool-free answer.
pub fn text(content: &str) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: usage(),
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    })
}

/// A response requesting tool calls.
pub fn calls(tool_calls: Vec<ToolCall>) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: String::new(),
        usage: usage(),
        tool_calls,
        finish_reason: Some("tool_calls".to_string()),
    })
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn search_call(id: &str, query: &str) -> ToolCall {
    call(
        id,
        "web_search",
        &serde_json::json!({ "query": query }).to_string(),
    )
}

/// A provider error with the given status and code.
pub fn api_error(status: u16, code: Option<&str>) -> Result<ChatResponse, AgentError> {
    Err(AgentError::ApiRequest {
        message: format!("HTTP {status}"),
        status: Some(status),
        code: code.map(str::to_string),
        body: None,
    })
}

/// Search backend returning two deterministic hits per query.
#[derive(Default)]
pub struct StaticSearch {
    delays: HashMap<String, Duration>,
    failure: Option<BackendError>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn failing(error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Delays the response for `query`.
    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&request.query) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let slug = request.query.replace(' ', "-");
        Ok(SearchResponse {
            answer: None,
            hits: (1..=2)
                .map(|i| SearchHit {
                    title: format!("{} result {i}", request.query),
                    url: format!("https://example.com/{slug}/{i}"),
                    snippet: format!("About {}", request.query),
                    favicon: None,
                })
                .collect(),
        })
    }
}

/// Extraction backend that reads every URL as a fixed body.
#[derive(Default)]
pub struct StaticExtract {
    pub body_len: usize,
}

#[async_trait]
impl ExtractBackend for StaticExtract {
    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse, BackendError> {
        Ok(ExtractResponse {
            pages: urls
                .iter()
                .map(|url| ExtractedPage {
                    url: url.clone(),
                    content: if self.body_len == 0 {
                        format!("Body of {url}")
                    } else {
                        "x".repeat(self.body_len)
                    },
                    favicon: None,
                })
                .collect(),
            failed: Vec::new(),
        })
    }
}

/// Sink that records every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
