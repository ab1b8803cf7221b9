//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool execution round-trip: sends the transcript to the
//! model, executes any tool calls in the response concurrently, appends the
//! results, and repeats until the model produces a final answer or the
//! iteration budget runs out. In deep mode a tool-free answer that arrives
//! before enough investigation has happened is sent back with a
//! continuation instruction instead of ending the run.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{AgentConfig, RunConfig};
use super::executor::{ExecutionContext, ToolExecutor};
use super::message::{
    ChatMessage, ChatRequest, ChatResponse, TokenUsage, ToolChoice, assistant_message,
    assistant_tool_calls_message, tool_message, user_message,
};
use super::outcome::ToolCallCounts;
use super::progress::{Emitter, EventKind, with_keep_alive};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::source::Source;
use super::step::Step;
use super::tool::{ToolKind, ToolSet};
use crate::error::AgentError;

/// Everything a run borrows from its orchestrator.
pub struct LoopContext<'a> {
    /// Model provider.
    pub provider: &'a dyn LlmProvider,
    /// Tool dispatcher.
    pub executor: &'a ToolExecutor,
    /// Prompt templates.
    pub prompts: &'a PromptSet,
    /// Model, timeouts, and keep-alive interval.
    pub config: &'a AgentConfig,
    /// Progress destination.
    pub emitter: Emitter<'a>,
    /// Run cancellation.
    pub cancel: &'a CancellationToken,
}

/// Mutable state of one run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Append-only transcript, starting with the system message.
    pub messages: Vec<ChatMessage>,
    /// Reasoning iterations entered so far.
    pub iteration: usize,
    /// Tool invocations attempted, including failures and unknown tools.
    pub tool_calls_used: usize,
    /// Attempts per known tool kind.
    pub counts: ToolCallCounts,
    /// Tool invocations that produced usable content.
    pub successful_tool_calls: usize,
    /// Steps in start order.
    pub steps: Vec<Step>,
    /// Citations in gathering order, possibly with duplicates.
    pub sources: Vec<Source>,
    /// Continuation overrides applied.
    pub continuations_forced: usize,
    /// `true` once a synthesis pass produced the answer.
    pub synthesized: bool,
    /// Usage across every completion.
    pub usage: TokenUsage,
}

impl RunState {
    /// Starts a run from an initial transcript.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The model produced a usable final answer.
    Answered(String),
    /// The budget ran out, or the last answer was empty.
    NeedsSynthesis,
}

/// Picks the tool directive for an iteration.
fn tool_choice(config: &RunConfig, tools: &ToolSet, iteration: usize) -> ToolChoice {
    let search = ToolKind::Search.name();
    if tools.is_empty() {
        ToolChoice::None
    } else if iteration == 1 && config.force_tool_on_first_step && tools.contains(search) {
        ToolChoice::Forced(search.to_string())
    } else {
        ToolChoice::Auto
    }
}

/// Returns `true` when a tool-free answer must be sent back for more research.
fn should_continue(config: &RunConfig, tools: &ToolSet, state: &RunState) -> bool {
    config.is_deep()
        && !tools.is_empty()
        && state.tool_calls_used < config.continuation.min_tool_calls
        && state.iteration < config.max_iterations
}

/// Sends one completion request, bounded by the model timeout and raced
/// against cancellation, pinging the sink while it waits.
pub async fn complete(
    ctx: &LoopContext<'_>,
    request: &ChatRequest,
) -> Result<ChatResponse, AgentError> {
    let timeout = ctx.config.model_timeout;
    let guarded = async {
        tokio::select! {
            () = ctx.cancel.cancelled() => Err(AgentError::Cancelled),
            res = tokio::time::timeout(timeout, ctx.provider.chat(request)) => {
                res.unwrap_or_else(|_| {
                    Err(AgentError::Timeout {
                        operation: "model completion",
                        seconds: timeout.as_secs(),
                    })
                })
            }
        }
    };
    with_keep_alive(ctx.emitter, ctx.config.keep_alive_interval, guarded).await
}

/// Runs reasoning iterations until an answer or the budget is exhausted.
///
/// The state is updated in place so the caller can recover from a model
/// failure using whatever was gathered before it.
///
/// # Errors
///
/// Returns [`AgentError::Cancelled`] when the run is cancelled, and
/// propagates model provider failures unclassified.
pub async fn agentic_loop(
    ctx: &LoopContext<'_>,
    config: &RunConfig,
    state: &mut RunState,
) -> Result<LoopExit, AgentError> {
    let tools = ToolSet::for_request(&config.tools_enabled, config.context().is_some());

    while state.iteration < config.max_iterations {
        if ctx.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        state.iteration += 1;
        let iteration = state.iteration;
        ctx.emitter.status(
            EventKind::Thinking,
            if iteration == 1 {
                "Thinking..."
            } else {
                "Reviewing findings..."
            },
        );

        let request = ChatRequest {
            model: ctx.config.model.clone(),
            messages: state.messages.clone(),
            temperature: Some(config.temperature),
            max_tokens: Some(ctx.config.max_tokens),
            tools: tools.definitions().to_vec(),
            tool_choice: tool_choice(config, &tools, iteration),
        };
        let response = complete(ctx, &request).await?;
        state.usage.accumulate(response.usage);

        let calls = if tools.is_empty() {
            if !response.tool_calls.is_empty() {
                warn!(
                    iteration,
                    count = response.tool_calls.len(),
                    "ignoring tool calls while no tools are offered"
                );
            }
            Vec::new()
        } else {
            response.tool_calls
        };

        if calls.is_empty() {
            if should_continue(config, &tools, state) {
                info!(
                    iteration,
                    tool_calls = state.tool_calls_used,
                    min_tool_calls = config.continuation.min_tool_calls,
                    "forcing continuation"
                );
                state.messages.push(assistant_message(&response.content));
                state.messages.push(user_message(
                    &ctx.prompts.build_continuation_prompt(
                        state.tool_calls_used,
                        config.continuation.min_tool_calls,
                    ),
                ));
                state.continuations_forced += 1;
                continue;
            }

            let text = response.content.trim();
            if text.is_empty() {
                debug!(iteration, "empty final answer");
                return Ok(LoopExit::NeedsSynthesis);
            }
            debug!(iteration, "loop completed with final text response");
            state.messages.push(assistant_message(text));
            return Ok(LoopExit::Answered(text.to_string()));
        }

        debug!(iteration, tool_count = calls.len(), "executing tool calls");
        state
            .messages
            .push(assistant_tool_calls_message(&response.content, calls.clone()));

        let exec_ctx = ExecutionContext {
            emitter: ctx.emitter,
            cancel: ctx.cancel,
            tools: &tools,
            search_depth: config.search_depth,
            max_results: config.default_search_results(),
        };
        let outcomes = with_keep_alive(
            ctx.emitter,
            ctx.config.keep_alive_interval,
            ctx.executor.execute_all(&calls, exec_ctx),
        )
        .await;

        for outcome in outcomes {
            debug!(
                call_id = %outcome.result.tool_call_id,
                is_error = outcome.result.is_error,
                "tool execution complete"
            );
            state.tool_calls_used += 1;
            if let Some(kind) = outcome.kind {
                state.counts.record(kind);
            }
            if outcome.succeeded() {
                state.successful_tool_calls += 1;
            }
            if let Some(step) = outcome.step {
                state.steps.push(step);
            }
            state.sources.extend(outcome.sources);
            state.messages.push(tool_message(
                &outcome.result.tool_call_id,
                &outcome.result.content,
            ));
        }
    }

    if ctx.cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }
    info!(
        iterations = state.iteration,
        tool_calls = state.tool_calls_used,
        "iteration budget exhausted"
    );
    Ok(LoopExit::NeedsSynthesis)
}

/// Issues one tool-free completion over the transcript plus the synthesis
/// instruction. The returned text is the final answer as-is.
///
/// # Errors
///
/// Propagates the provider failure, a timeout, or cancellation.
pub async fn synthesize(
    ctx: &LoopContext<'_>,
    config: &RunConfig,
    state: &mut RunState,
) -> Result<String, AgentError> {
    ctx.emitter
        .status(EventKind::Synthesizing, "Writing the answer...");
    let mut messages = state.messages.clone();
    messages.push(user_message(&ctx.prompts.synthesis));

    let request = ChatRequest {
        model: ctx.config.model.clone(),
        messages,
        temperature: Some(config.temperature),
        max_tokens: Some(ctx.config.max_tokens),
        tools: Vec::new(),
        tool_choice: ToolChoice::None,
    };
    let response = complete(ctx, &request).await?;
    state.usage.accumulate(response.usage);
    state.synthesized = true;
    Ok(response.content.trim().to_string())
}
