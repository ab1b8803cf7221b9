//! Tool type definitions for web research function-calling.
//!
//! Provides provider-agnostic types for tool definitions, calls, and results,
//! the registry of research tools, and the typed argument structures each
//! tool call is parsed into.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

/// Maximum results a single `web_search` call may request.
pub const MAX_SEARCH_RESULTS: usize = 10;
/// Maximum URLs a single `extract_content` call may read.
pub const MAX_EXTRACT_URLS: usize = 5;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match dispatch table in executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (formatted text on success, error message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result.
    #[must_use]
    pub fn ok(tool_call_id: &str, content: String) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            content,
            is_error: false,
        }
    }

    /// Failed result carrying an error description for the model.
    #[must_use]
    pub fn error(tool_call_id: &str, message: impl std::fmt::Display) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            content: format!("Error: {message}"),
            is_error: true,
        }
    }
}

/// The research tools the loop knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Web search.
    Search,
    /// Full-page content extraction.
    Extract,
}

impl ToolKind {
    /// Every tool kind, in registry order.
    pub const ALL: [Self; 2] = [Self::Search, Self::Extract];

    /// Function name exposed to the model.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Search => "web_search",
            Self::Extract => "extract_content",
        }
    }

    /// Resolves a function name back to a kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Schema definition for this tool.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        match self {
            Self::Search => def_web_search(),
            Self::Extract => def_extract_content(),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of tool definitions offered on one request.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if a tool with this name is offered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }

    /// Both research tools: `web_search` and `extract_content`.
    #[must_use]
    pub fn research_tools() -> Self {
        Self::for_kinds(&ToolKind::ALL.into_iter().collect())
    }

    /// Tools for the enabled kinds, in registry order.
    #[must_use]
    pub fn for_kinds(enabled: &BTreeSet<ToolKind>) -> Self {
        Self {
            definitions: ToolKind::ALL
                .into_iter()
                .filter(|k| enabled.contains(k))
                .map(ToolKind::definition)
                .collect(),
        }
    }

    /// Tools offered for one run.
    ///
    /// Pre-supplied context disables every tool: the model must answer
    /// from the context alone.
    #[must_use]
    pub fn for_request(enabled: &BTreeSet<ToolKind>, has_context: bool) -> Self {
        if has_context {
            Self::none()
        } else {
            Self::for_kinds(enabled)
        }
    }

    /// Empty tool set (no tools available).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Typed arguments
// ---------------------------------------------------------------------------

/// Search topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    /// General web search.
    #[default]
    General,
    /// Recent news.
    News,
}

/// Search depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    /// Fast, cheaper search.
    #[default]
    Basic,
    /// Slower search with richer snippets.
    Advanced,
}

/// Arguments of a `web_search` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    /// Search query text.
    pub query: String,
    /// Topic override.
    #[serde(default)]
    pub topic: Option<SearchTopic>,
    /// Depth override.
    #[serde(default)]
    pub search_depth: Option<SearchDepth>,
    /// Result count override (clamped to `1..=MAX_SEARCH_RESULTS`).
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchArgs {
    /// Parses and validates raw tool arguments.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let mut args: Self = parse_json(ToolKind::Search, raw)?;
        args.query = args.query.trim().to_string();
        if args.query.is_empty() {
            return Err(invalid(ToolKind::Search, "'query' must not be empty"));
        }
        args.max_results = args.max_results.map(|n| n.clamp(1, MAX_SEARCH_RESULTS));
        Ok(args)
    }
}

/// Arguments of an `extract_content` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractArgs {
    /// Pages to read.
    pub urls: Vec<String>,
}

impl ExtractArgs {
    /// Parses and validates raw tool arguments.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let args: Self = parse_json(ToolKind::Extract, raw)?;
        if args.urls.is_empty() {
            return Err(invalid(ToolKind::Extract, "'urls' must not be empty"));
        }
        if args.urls.len() > MAX_EXTRACT_URLS {
            return Err(invalid(
                ToolKind::Extract,
                format!(
                    "too many URLs ({}, max {MAX_EXTRACT_URLS})",
                    args.urls.len()
                ),
            ));
        }
        for url in &args.urls {
            let scheme_ok = reqwest::Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !scheme_ok {
                return Err(invalid(
                    ToolKind::Extract,
                    format!("not an http(s) URL: {url}"),
                ));
            }
        }
        Ok(args)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(kind: ToolKind, raw: &str) -> Result<T, AgentError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| invalid(kind, e))
}

fn invalid(kind: ToolKind, message: impl std::fmt::Display) -> AgentError {
    AgentError::ToolArguments {
        name: kind.name().to_string(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

/// Defines the `web_search` tool.
fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Search.name().to_string(),
        description: "Search the web for current information. Returns an optional direct \
                       answer plus titled result snippets with their URLs. Use focused, \
                       specific queries; call several times for different angles."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query text."
                },
                "topic": {
                    "type": "string",
                    "enum": ["general", "news"],
                    "description": "Use 'news' for recent events. Defaults to 'general'.",
                    "default": "general"
                },
                "search_depth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "description": "'advanced' returns richer snippets but is slower."
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_SEARCH_RESULTS,
                    "description": "Maximum number of results to return."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `extract_content` tool.
fn def_extract_content() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Extract.name().to_string(),
        description: "Read the full text of one or more web pages. Use after a search when \
                       snippets are not detailed enough."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": MAX_EXTRACT_URLS,
                    "description": "Absolute http(s) URLs to read."
                }
            },
            "required": ["urls"],
            "additionalProperties": false
        }),
    }
}
