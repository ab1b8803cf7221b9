//! Orchestrator for research runs.
//!
//! Validates the request, builds the initial transcript, drives the
//! [`agentic_loop`], applies the recovery policy when the model fails, and
//! assembles the [`RunResult`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::agentic_loop::{LoopContext, LoopExit, RunState, agentic_loop, synthesize};
use super::config::{AgentConfig, RunConfig};
use super::executor::ToolExecutor;
use super::message::{ChatMessage, Role, assistant_message, system_message, user_message};
use super::outcome::{ErrorCode, RunFailure, RunResult};
use super::progress::{Emitter, EventKind, ProgressEvent, ProgressSink};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::recovery::{Recovery, classify, plan_recovery};
use super::source::dedupe_sources;
use super::step::Step;
use crate::error::AgentError;

/// Maximum byte length of a user message.
pub const MAX_MESSAGE_LEN: usize = 10_000;

/// Orchestrates research runs.
///
/// Holds only shared, stateless clients, so one orchestrator serves any
/// number of concurrent runs.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    config: AgentConfig,
    prompts: PromptSet,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates a new orchestrator with the given provider, executor, and
    /// configuration.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, executor: ToolExecutor, config: AgentConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            executor,
            config,
            prompts,
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Runs one research request to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] with a stable code when the request is
    /// invalid or the model fails without a recoverable answer.
    pub async fn run(
        &self,
        message: &str,
        history: &[ChatMessage],
        run_config: &RunConfig,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<RunResult, RunFailure> {
        self.run_with_cancel(message, history, run_config, sink, CancellationToken::new())
            .await
    }

    /// Runs one research request, stopping early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::run`], plus [`ErrorCode::Cancelled`].
    pub async fn run_with_cancel(
        &self,
        message: &str,
        history: &[ChatMessage],
        run_config: &RunConfig,
        sink: Option<&dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunFailure> {
        let emitter = Emitter::new(sink);
        let outcome = self
            .execute(message, history, run_config, emitter, &cancel)
            .await;
        match &outcome {
            Ok(result) => emitter.emit(ProgressEvent::new(
                EventKind::Complete,
                format!(
                    "Done after {} iteration(s) and {} tool call(s)",
                    result.iterations_used, result.tool_calls_used
                ),
            )),
            Err(failure) => emitter.emit(ProgressEvent::error(failure.error.clone(), failure.code)),
        }
        outcome
    }

    async fn execute(
        &self,
        message: &str,
        history: &[ChatMessage],
        run_config: &RunConfig,
        emitter: Emitter<'_>,
        cancel: &CancellationToken,
    ) -> Result<RunResult, RunFailure> {
        let start = Instant::now();
        let message = validate_message(message)?;
        run_config
            .validate()
            .map_err(|e| RunFailure::invalid_input(e.to_string()))?;

        info!(
            mode = ?run_config.mode,
            max_iterations = run_config.max_iterations,
            context = run_config.context().is_some(),
            "starting research run"
        );

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system_message(
            &self
                .prompts
                .build_system_prompt(run_config, Utc::now().date_naive()),
        ));
        messages.extend(sanitize_history(history));
        messages.push(user_message(message));

        let ctx = LoopContext {
            provider: self.provider.as_ref(),
            executor: &self.executor,
            prompts: &self.prompts,
            config: &self.config,
            emitter,
            cancel,
        };
        let mut state = RunState::new(messages);

        let final_text = match agentic_loop(&ctx, run_config, &mut state).await {
            Ok(LoopExit::Answered(text)) => text,
            Ok(LoopExit::NeedsSynthesis) => synthesize(&ctx, run_config, &mut state)
                .await
                .map_err(|e| surface(&e))?,
            Err(err) => recover(&ctx, run_config, &mut state, err).await?,
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            iterations = state.iteration,
            tool_calls = state.tool_calls_used,
            synthesized = state.synthesized,
            elapsed_ms,
            "research run complete"
        );

        Ok(RunResult {
            final_text,
            search_performed: state.steps.iter().any(Step::is_search),
            sources: dedupe_sources(state.sources),
            steps: state.steps,
            iterations_used: state.iteration,
            tool_calls_used: state.tool_calls_used,
            tool_calls_by_kind: state.counts,
            continuations_forced: state.continuations_forced,
            synthesized: state.synthesized,
            usage: state.usage,
            elapsed_ms,
        })
    }
}

/// Applies the recovery policy to a model failure.
async fn recover(
    ctx: &LoopContext<'_>,
    run_config: &RunConfig,
    state: &mut RunState,
    err: AgentError,
) -> Result<String, RunFailure> {
    let failure = classify(&err);
    warn!(
        error = %err,
        code = %failure.code(),
        successful_tool_calls = state.successful_tool_calls,
        "model call failed"
    );
    match plan_recovery(&failure, state.successful_tool_calls) {
        Recovery::UseSalvaged(text) => {
            info!("using text salvaged from malformed tool call");
            Ok(text)
        }
        Recovery::DegradedSynthesis => match synthesize(ctx, run_config, state).await {
            Ok(text) => Ok(text),
            Err(synthesis_err) => {
                warn!(error = %synthesis_err, "degraded synthesis failed");
                Err(RunFailure::from_code(failure.code()))
            }
        },
        Recovery::Surface => Err(RunFailure::from_code(failure.code())),
    }
}

/// Converts an unrecoverable error into a failure with its stable code.
fn surface(err: &AgentError) -> RunFailure {
    let failure = classify(err);
    warn!(error = %err, code = %failure.code(), "run failed");
    RunFailure::from_code(failure.code())
}

/// Rejects blank and oversized messages. Returns the trimmed message.
///
/// The length limit applies to the trimmed text, which is what the model
/// receives.
fn validate_message(message: &str) -> Result<&str, RunFailure> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(RunFailure::invalid_input("Message cannot be empty"));
    }
    if trimmed.len() > MAX_MESSAGE_LEN {
        return Err(RunFailure::invalid_input(format!(
            "Message exceeds maximum length ({} bytes, max {MAX_MESSAGE_LEN})",
            trimmed.len()
        )));
    }
    Ok(trimmed)
}

/// Keeps only user and assistant text turns from caller history.
///
/// Tool calls, tool results, and system turns are dropped so the transcript
/// never contains a tool result without its originating call.
#[must_use]
pub fn sanitize_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .filter_map(|m| match m.role {
            Role::User => Some(user_message(&m.content)),
            Role::Assistant => Some(assistant_message(&m.content)),
            Role::System | Role::Tool => None,
        })
        .collect()
}

/// Error code for an [`AgentError`] raised outside a run.
#[must_use]
pub fn error_code(err: &AgentError) -> ErrorCode {
    match err {
        AgentError::InvalidInput { .. } | AgentError::ToolArguments { .. } => {
            ErrorCode::InvalidInput
        }
        other => classify(other).code(),
    }
}
