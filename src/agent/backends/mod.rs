//! Search and extraction services behind the research tools.
//!
//! The executor talks to these traits only; [`tavily`] is the production
//! implementation and tests substitute in-memory doubles.

pub mod tavily;

use async_trait::async_trait;
use thiserror::Error;

use super::source::Source;
use super::tool::{SearchDepth, SearchTopic};

pub use tavily::TavilyClient;

/// Failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The backend rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The backend did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),
    /// The backend was unreachable or returned an unusable response.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// A resolved search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Query text (non-empty).
    pub query: String,
    /// Topic.
    pub topic: SearchTopic,
    /// Depth.
    pub depth: SearchDepth,
    /// Result count, already clamped.
    pub max_results: usize,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Snippet relevant to the query.
    pub snippet: String,
    /// Favicon URL.
    pub favicon: Option<String>,
}

/// Search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResponse {
    /// Direct answer, when the backend produced one.
    pub answer: Option<String>,
    /// Ranked hits.
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    /// Renders the response as a numbered plain-text block for the model.
    #[must_use]
    pub fn formatted(&self) -> String {
        let mut out = String::new();
        if let Some(answer) = self.answer.as_deref().filter(|a| !a.trim().is_empty()) {
            out.push_str("Answer: ");
            out.push_str(answer.trim());
            out.push_str("\n\n");
        }
        if self.hits.is_empty() {
            out.push_str("No results found.");
            return out;
        }
        out.push_str("Results:\n");
        for (i, hit) in self.hits.iter().enumerate() {
            out.push_str(&format!(
                "\n[{}] {}\nURL: {}\n{}\n",
                i + 1,
                hit.title,
                hit.url,
                hit.snippet.trim()
            ));
        }
        out
    }

    /// Citations for every hit, in rank order.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        self.hits
            .iter()
            .map(|h| Source::new(h.title.clone(), h.url.clone(), h.favicon.clone()))
            .collect()
    }
}

/// A page read by the extraction backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Page URL.
    pub url: String,
    /// Page text.
    pub content: String,
    /// Favicon URL.
    pub favicon: Option<String>,
}

/// A page the extraction backend could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    /// Page URL.
    pub url: String,
    /// Why it failed.
    pub error: String,
}

/// Extraction results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractResponse {
    /// Pages read successfully.
    pub pages: Vec<ExtractedPage>,
    /// Pages that failed.
    pub failed: Vec<FailedPage>,
}

/// Web search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs one search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, BackendError>;
}

/// Page extraction service.
#[async_trait]
pub trait ExtractBackend: Send + Sync {
    /// Reads the given pages. Per-URL failures are reported in the response,
    /// not as an error.
    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse, BackendError>;
}
