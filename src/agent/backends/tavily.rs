//! Tavily search and extraction client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    BackendError, ExtractBackend, ExtractResponse, ExtractedPage, FailedPage, SearchBackend,
    SearchHit, SearchRequest, SearchResponse,
};
use crate::agent::tool::{SearchDepth, SearchTopic};
use crate::error::AgentError;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// HTTP client for the Tavily API.
#[derive(Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    topic: SearchTopic,
    search_depth: SearchDepth,
    max_results: usize,
    include_answer: bool,
    include_favicon: bool,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchReplyItem>,
}

#[derive(Deserialize)]
struct SearchReplyItem {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Serialize)]
struct ExtractBody<'a> {
    urls: &'a [String],
    include_favicon: bool,
}

#[derive(Deserialize)]
struct ExtractReply {
    #[serde(default)]
    results: Vec<ExtractReplyItem>,
    #[serde(default)]
    failed_results: Vec<ExtractReplyFailure>,
}

#[derive(Deserialize)]
struct ExtractReplyItem {
    url: String,
    #[serde(default)]
    raw_content: String,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Deserialize)]
struct ExtractReplyFailure {
    url: String,
    #[serde(default)]
    error: String,
}

impl TavilyClient {
    /// Creates a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), path, "tavily request failed");
            return Err(map_status(status.as_u16(), text));
        }
        response.json::<R>().await.map_err(map_transport_error)
    }
}

/// Maps an HTTP error status to a backend failure.
fn map_status(status: u16, body: String) -> BackendError {
    let detail = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };
    match status {
        // 432/433 are Tavily's plan and pay-as-you-go limit codes.
        429 | 432 | 433 => BackendError::RateLimited(detail),
        401 | 403 => BackendError::Auth(detail),
        408 | 504 => BackendError::Timeout(detail),
        _ => BackendError::Unavailable(detail),
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl SearchBackend for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError> {
        let body = SearchBody {
            query: &request.query,
            topic: request.topic,
            search_depth: request.depth,
            max_results: request.max_results,
            include_answer: true,
            include_favicon: true,
        };
        let reply: SearchReply = self.post("/search", &body).await?;
        tracing::debug!(
            query = %request.query,
            hits = reply.results.len(),
            "tavily search complete"
        );
        Ok(reply.into())
    }
}

#[async_trait]
impl ExtractBackend for TavilyClient {
    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse, BackendError> {
        let body = ExtractBody {
            urls,
            include_favicon: true,
        };
        let reply: ExtractReply = self.post("/extract", &body).await?;
        tracing::debug!(
            read = reply.results.len(),
            failed = reply.failed_results.len(),
            "tavily extract complete"
        );
        Ok(reply.into())
    }
}

impl From<SearchReply> for SearchResponse {
    fn from(reply: SearchReply) -> Self {
        Self {
            answer: reply.answer,
            hits: reply
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                    favicon: r.favicon,
                })
                .collect(),
        }
    }
}

impl From<ExtractReply> for ExtractResponse {
    fn from(reply: ExtractReply) -> Self {
        Self {
            pages: reply
                .results
                .into_iter()
                .map(|r| ExtractedPage {
                    url: r.url,
                    content: r.raw_content,
                    favicon: r.favicon,
                })
                .collect(),
            failed: reply
                .failed_results
                .into_iter()
                .map(|f| FailedPage {
                    url: f.url,
                    error: f.error,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(429 => matches BackendError::RateLimited(_) ; "too many requests")]
    #[test_case(432 => matches BackendError::RateLimited(_) ; "plan limit")]
    #[test_case(401 => matches BackendError::Auth(_) ; "unauthorized")]
    #[test_case(403 => matches BackendError::Auth(_) ; "forbidden")]
    #[test_case(504 => matches BackendError::Timeout(_) ; "gateway timeout")]
    #[test_case(500 => matches BackendError::Unavailable(_) ; "server error")]
    fn test_map_status(status: u16) -> BackendError {
        map_status(status, String::new())
    }

    #[test]
    fn test_search_reply_parsing() {
        let json = r#"{
            "query": "capital of france",
            "answer": "Paris",
            "results": [
                {"title": "Paris - Wikipedia", "url": "https://en.wikipedia.org/wiki/Paris", "content": "Paris is the capital.", "score": 0.98, "favicon": "https://en.wikipedia.org/favicon.ico"},
                {"url": "https://www.example.com/paris", "content": "More about Paris."}
            ],
            "response_time": 1.2
        }"#;
        let reply: SearchReply = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        let response = SearchResponse::from(reply);
        assert_eq!(response.answer.as_deref(), Some("Paris"));
        assert_eq!(response.hits.len(), 2);
        let sources = response.sources();
        assert_eq!(sources[1].title, "example.com");
        assert!(sources[0].favicon.is_some());
    }

    #[test]
    fn test_extract_reply_parsing() {
        let json = r#"{
            "results": [{"url": "https://a.com", "raw_content": "Body text"}],
            "failed_results": [{"url": "https://b.com", "error": "blocked"}]
        }"#;
        let reply: ExtractReply = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        let response = ExtractResponse::from(reply);
        assert_eq!(response.pages[0].content, "Body text");
        assert_eq!(response.failed[0].error, "blocked");
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = TavilyClient::new("tvly-secret", Duration::from_secs(5))
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!format!("{client:?}").contains("tvly-secret"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = TavilyClient::with_base_url("k", "http://localhost:9/", Duration::from_secs(1))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(client.base_url, "http://localhost:9");
    }
}
