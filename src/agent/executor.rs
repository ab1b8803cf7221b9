//! Tool executor that dispatches tool calls to the search and extraction
//! backends.
//!
//! Every call yields a [`ToolOutcome`]: failures of any kind (bad
//! arguments, unknown or disabled tool, backend errors, timeouts) become an error
//! [`ToolResult`] the model can read, never an `Err` the loop has to handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use super::backends::{ExtractBackend, ExtractResponse, SearchBackend, SearchRequest};
use super::progress::{Emitter, EventKind, ProgressEvent};
use super::source::Source;
use super::step::Step;
use super::tool::{
    ExtractArgs, SearchArgs, SearchDepth, SearchTopic, ToolCall, ToolKind, ToolResult, ToolSet,
};
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
pub const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Maximum characters of page text handed back per extracted page.
pub const MAX_PAGE_CHARS: usize = 8_000;

/// Per-run inputs to tool execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Progress destination.
    pub emitter: Emitter<'a>,
    /// Run cancellation.
    pub cancel: &'a CancellationToken,
    /// Tools offered on the request; calls to anything else are refused.
    pub tools: &'a ToolSet,
    /// Depth for searches that do not pick one.
    pub search_depth: SearchDepth,
    /// Result count for searches that do not pick one.
    pub max_results: usize,
}

/// Result of one tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Message content for the model.
    pub result: ToolResult,
    /// Step recorded for the call; `None` for unknown or disabled tools
    /// and cancellation.
    pub step: Option<Step>,
    /// Citations gathered by the call.
    pub sources: Vec<Source>,
    /// Tool kind, when the name resolved to an enabled tool.
    pub kind: Option<ToolKind>,
}

impl ToolOutcome {
    /// Returns `true` when the call produced usable content.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !self.result.is_error
    }

    fn failed(call: &ToolCall, kind: Option<ToolKind>, step: Option<Step>, err: &AgentError) -> Self {
        Self {
            result: ToolResult::error(&call.id, err),
            step,
            sources: Vec::new(),
            kind,
        }
    }
}

/// Executes tool calls against injected backends.
///
/// Backends are shared (`Arc`) and stateless per call, so one executor
/// serves any number of concurrent runs.
#[derive(Clone)]
pub struct ToolExecutor {
    search: Arc<dyn SearchBackend>,
    extract: Arc<dyn ExtractBackend>,
    timeout: Duration,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ToolExecutor {
    /// Creates an executor with a per-call timeout.
    #[must_use]
    pub fn new(
        search: Arc<dyn SearchBackend>,
        extract: Arc<dyn ExtractBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            search,
            extract,
            timeout,
        }
    }

    /// Executes every call concurrently. Outcomes are in request order
    /// regardless of completion order.
    pub async fn execute_all(
        &self,
        calls: &[ToolCall],
        ctx: ExecutionContext<'_>,
    ) -> Vec<ToolOutcome> {
        join_all(calls.iter().map(|call| self.execute(call, ctx))).await
    }

    /// Dispatches a single tool call.
    ///
    /// Validates raw argument size before parsing.
    pub async fn execute(&self, call: &ToolCall, ctx: ExecutionContext<'_>) -> ToolOutcome {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            tracing::warn!(tool = %call.name, id = %call.id, "unknown tool requested");
            let err = AgentError::ToolExecution {
                name: call.name.clone(),
                message: "unknown tool".to_string(),
            };
            return ToolOutcome::failed(call, None, None, &err);
        };

        if !ctx.tools.contains(kind.name()) {
            tracing::warn!(tool = %kind, id = %call.id, "disabled tool requested");
            let err = AgentError::ToolExecution {
                name: kind.name().to_string(),
                message: "tool not enabled for this request".to_string(),
            };
            return ToolOutcome::failed(call, None, None, &err);
        }

        if ctx.cancel.is_cancelled() {
            return ToolOutcome::failed(call, Some(kind), None, &AgentError::Cancelled);
        }

        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            let err = AgentError::ToolArguments {
                name: kind.name().to_string(),
                message: format!(
                    "arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            };
            return Self::rejected(call, kind, &err, ctx);
        }

        match kind {
            ToolKind::Search => match SearchArgs::parse(&call.arguments) {
                Ok(args) => self.run_search(call, args, ctx).await,
                Err(e) => Self::rejected(call, kind, &e, ctx),
            },
            ToolKind::Extract => match ExtractArgs::parse(&call.arguments) {
                Ok(args) => self.run_extract(call, args, ctx).await,
                Err(e) => Self::rejected(call, kind, &e, ctx),
            },
        }
    }

    /// Records a failed step for a call whose arguments were rejected.
    ///
    /// The step still opens before it fails, so observers see the same
    /// started/completed pair as for an executed call.
    fn rejected(
        call: &ToolCall,
        kind: ToolKind,
        err: &AgentError,
        ctx: ExecutionContext<'_>,
    ) -> ToolOutcome {
        tracing::debug!(tool = %kind, id = %call.id, error = %err, "tool arguments rejected");
        let mut step = match kind {
            ToolKind::Search => Step::searching(String::new()),
            ToolKind::Extract => Step::reading(Vec::new()),
        };
        ctx.emitter.emit(ProgressEvent::with_step(
            started_kind(kind),
            match kind {
                ToolKind::Search => "Searching",
                ToolKind::Extract => "Reading",
            },
            step.clone(),
        ));
        step.fail();
        ctx.emitter.emit(ProgressEvent::with_step(
            complete_kind(kind),
            "Invalid tool arguments",
            step.clone(),
        ));
        ToolOutcome::failed(call, Some(kind), Some(step), err)
    }

    async fn run_search(
        &self,
        call: &ToolCall,
        args: SearchArgs,
        ctx: ExecutionContext<'_>,
    ) -> ToolOutcome {
        let request = SearchRequest {
            query: args.query,
            topic: args.topic.unwrap_or(SearchTopic::General),
            depth: args.search_depth.unwrap_or(ctx.search_depth),
            max_results: args.max_results.unwrap_or(ctx.max_results),
        };
        let mut step = Step::searching(request.query.clone());
        ctx.emitter.emit(ProgressEvent::with_step(
            EventKind::Searching,
            format!("Searching: {}", request.query),
            step.clone(),
        ));

        let response = self
            .guarded(ToolKind::Search, ctx.cancel, self.search.search(&request))
            .await;
        match response {
            Ok(response) => {
                step.complete(response.hits.len());
                tracing::debug!(query = %request.query, hits = response.hits.len(), "search done");
                ctx.emitter.emit(ProgressEvent::with_step(
                    EventKind::SearchComplete,
                    format!("Found {} results", response.hits.len()),
                    step.clone(),
                ));
                ToolOutcome {
                    result: ToolResult::ok(&call.id, response.formatted()),
                    step: Some(step),
                    sources: response.sources(),
                    kind: Some(ToolKind::Search),
                }
            }
            Err(e) => {
                step.fail();
                tracing::warn!(query = %request.query, error = %e, "search failed");
                ctx.emitter.emit(ProgressEvent::with_step(
                    EventKind::SearchComplete,
                    "Search failed",
                    step.clone(),
                ));
                ToolOutcome::failed(call, Some(ToolKind::Search), Some(step), &e)
            }
        }
    }

    async fn run_extract(
        &self,
        call: &ToolCall,
        args: ExtractArgs,
        ctx: ExecutionContext<'_>,
    ) -> ToolOutcome {
        let mut step = Step::reading(args.urls.clone());
        ctx.emitter.emit(ProgressEvent::with_step(
            EventKind::Reading,
            format!("Reading {} page(s)", args.urls.len()),
            step.clone(),
        ));

        let response = self
            .guarded(ToolKind::Extract, ctx.cancel, self.extract.extract(&args.urls))
            .await
            .and_then(|r| {
                if r.pages.is_empty() {
                    let reasons: Vec<String> =
                        r.failed.iter().map(|f| format!("{}: {}", f.url, f.error)).collect();
                    Err(AgentError::ToolExecution {
                        name: ToolKind::Extract.name().to_string(),
                        message: format!("no page could be read ({})", reasons.join("; ")),
                    })
                } else {
                    Ok(r)
                }
            });

        match response {
            Ok(response) => {
                step.complete(response.pages.len());
                ctx.emitter.emit(ProgressEvent::with_step(
                    EventKind::ReadingComplete,
                    format!("Read {} page(s)", response.pages.len()),
                    step.clone(),
                ));
                let sources = response
                    .pages
                    .iter()
                    .map(|p| Source::new(String::new(), p.url.clone(), p.favicon.clone()))
                    .collect();
                ToolOutcome {
                    result: ToolResult::ok(&call.id, format_pages(&response)),
                    step: Some(step),
                    sources,
                    kind: Some(ToolKind::Extract),
                }
            }
            Err(e) => {
                step.fail();
                tracing::warn!(urls = ?args.urls, error = %e, "extract failed");
                ctx.emitter.emit(ProgressEvent::with_step(
                    EventKind::ReadingComplete,
                    "Could not read pages",
                    step.clone(),
                ));
                ToolOutcome::failed(call, Some(ToolKind::Extract), Some(step), &e)
            }
        }
    }

    /// Runs a backend call under the per-call timeout, racing cancellation.
    async fn guarded<T, F>(
        &self,
        kind: ToolKind,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T, AgentError>
    where
        F: Future<Output = Result<T, super::backends::BackendError>>,
    {
        tokio::select! {
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(AgentError::ToolExecution {
                    name: kind.name().to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(AgentError::Timeout {
                    operation: kind.name(),
                    seconds: self.timeout.as_secs(),
                }),
            },
        }
    }
}

const fn started_kind(kind: ToolKind) -> EventKind {
    match kind {
        ToolKind::Search => EventKind::Searching,
        ToolKind::Extract => EventKind::Reading,
    }
}

const fn complete_kind(kind: ToolKind) -> EventKind {
    match kind {
        ToolKind::Search => EventKind::SearchComplete,
        ToolKind::Extract => EventKind::ReadingComplete,
    }
}

/// Truncates `text` to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

fn format_pages(response: &ExtractResponse) -> String {
    let mut out = String::new();
    for page in &response.pages {
        let (body, truncated) = truncate_chars(page.content.trim(), MAX_PAGE_CHARS);
        out.push_str(&format!("Content from {}:\n{body}", page.url));
        if truncated {
            out.push_str("\n[content truncated]");
        }
        out.push_str("\n\n");
    }
    for failed in &response.failed {
        out.push_str(&format!("Failed to read {}: {}\n", failed.url, failed.error));
    }
    out.trim_end().to_string()
}
