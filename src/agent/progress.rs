//! Progress events pushed to a caller-supplied sink during a run.
//!
//! Emission is fire-and-forget: a sink that fails (closed channel, dropped
//! client) never affects the run. The [`Emitter`] wrapper swallows and logs
//! sink errors so call sites stay one-liners.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use super::outcome::{ErrorCode, RunResult};
use super::step::Step;

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The model is reasoning.
    Thinking,
    /// A search started.
    Searching,
    /// A search finished (successfully or not).
    SearchComplete,
    /// A page extraction started.
    Reading,
    /// A page extraction finished (successfully or not).
    ReadingComplete,
    /// The final answer is being written.
    Synthesizing,
    /// The run failed.
    Error,
    /// The run produced its answer.
    Complete,
    /// Terminal event of a stream.
    Done,
    /// Final payload at the transport boundary.
    Result,
}

/// A structured progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Human-readable status line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// The step this event refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// Final result (only on `result` events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RunResult>>,
    /// Stable error code (only on `error` events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ProgressEvent {
    /// Event with a status line.
    #[must_use]
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step: None,
            data: None,
            code: None,
        }
    }

    /// Event carrying a step snapshot.
    #[must_use]
    pub fn with_step(kind: EventKind, message: impl Into<String>, step: Step) -> Self {
        Self {
            step: Some(step),
            ..Self::new(kind, message)
        }
    }

    /// `error` event with a stable code.
    #[must_use]
    pub fn error(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            code: Some(code),
            ..Self::new(EventKind::Error, message)
        }
    }

    /// `result` event carrying the final result.
    #[must_use]
    pub fn result(result: RunResult) -> Self {
        Self {
            data: Some(Box::new(result)),
            ..Self::new(EventKind::Result, "")
        }
    }

    /// Terminal `done` event.
    #[must_use]
    pub fn done() -> Self {
        Self::new(EventKind::Done, "")
    }
}

/// A sink rejected an event.
#[derive(Debug, Error)]
#[error("progress sink closed: {0}")]
pub struct SinkError(pub String);

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the consumer has gone away.
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError>;

    /// Called on a fixed interval while the run awaits an external call.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the consumer has gone away.
    fn keep_alive(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Messages carried by a [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SinkMessage {
    /// A progress event.
    Event(ProgressEvent),
    /// Keep-alive ping.
    KeepAlive,
}

/// Sink that forwards events over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        self.tx
            .send(SinkMessage::Event(event))
            .map_err(|e| SinkError(e.to_string()))
    }

    fn keep_alive(&self) -> Result<(), SinkError> {
        self.tx
            .send(SinkMessage::KeepAlive)
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        match &event.step {
            Some(step) => tracing::info!(
                kind = ?event.kind,
                step_id = %step.id,
                status = ?step.status,
                result_count = ?step.result_count,
                "{}",
                event.message
            ),
            None => tracing::info!(kind = ?event.kind, "{}", event.message),
        }
        Ok(())
    }
}

/// Fire-and-forget wrapper around an optional sink.
#[derive(Clone, Copy, Default)]
pub struct Emitter<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl std::fmt::Debug for Emitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

impl<'a> Emitter<'a> {
    /// Wraps a sink. `None` discards every event.
    #[must_use]
    pub const fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink }
    }

    /// Delivers an event, discarding sink failures.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = self.sink
            && let Err(e) = sink.emit(event)
        {
            tracing::debug!(error = %e, "dropping progress event");
        }
    }

    /// Shorthand for a step-less event.
    pub fn status(&self, kind: EventKind, message: impl Into<String>) {
        self.emit(ProgressEvent::new(kind, message));
    }

    /// Pings the sink, discarding failures.
    pub fn keep_alive(&self) {
        if let Some(sink) = self.sink
            && let Err(e) = sink.keep_alive()
        {
            tracing::debug!(error = %e, "dropping keep-alive");
        }
    }

    /// Returns `true` when a sink is attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.sink.is_some()
    }
}

/// Awaits `fut`, pinging the sink every `interval` until it resolves.
pub async fn with_keep_alive<F: Future>(
    emitter: Emitter<'_>,
    interval: Duration,
    fut: F,
) -> F::Output {
    if !emitter.is_attached() {
        return fut.await;
    }
    tokio::pin!(fut);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            _ = ticker.tick() => emitter.keep_alive(),
        }
    }
}
