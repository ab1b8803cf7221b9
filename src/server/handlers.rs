//! HTTP route handlers.
//!
//! Runs share one [`Orchestrator`]. Streaming runs are spawned onto the
//! runtime and cancelled when the client disconnects.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::orchestrator::Orchestrator;
use crate::agent::outcome::{ErrorCode, RunFailure, RunResult};
use crate::agent::progress::{ChannelSink, Emitter, ProgressEvent, ProgressSink, SinkMessage};

use super::params::ChatParams;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Orchestrator serving every request.
    pub orchestrator: Arc<Orchestrator>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .with_state(state)
}

/// HTTP status for a failure code.
#[must_use]
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCode::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::ToolUseFailed => StatusCode::BAD_GATEWAY,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Cancelled => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ErrorCode::AuthError | ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_response(failure: &RunFailure) -> Response {
    let body = serde_json::json!({
        "error": failure.error,
        "code": failure.code,
    });
    (status_for(failure.code), Json(body)).into_response()
}

fn rejection_response(rejection: &JsonRejection) -> Response {
    debug!(error = %rejection, "rejected request body");
    failure_response(&RunFailure::invalid_input(format!(
        "Invalid request body: {}",
        rejection.body_text()
    )))
}

async fn health() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatParams>, JsonRejection>,
) -> Response {
    let Json(params) = match payload {
        Ok(params) => params,
        Err(rejection) => return rejection_response(&rejection),
    };

    let run_config = params.run_config();
    match state
        .orchestrator
        .run(&params.message, &params.history, &run_config, None)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(failure) => failure_response(&failure),
    }
}

/// Sends the terminal events of a streamed run.
///
/// The orchestrator already emitted the error event on failure, so only a
/// success adds a `result` before `done`.
fn finish_stream(sink: &dyn ProgressSink, outcome: Result<RunResult, RunFailure>) {
    let emitter = Emitter::new(Some(sink));
    if let Ok(result) = outcome {
        emitter.emit(ProgressEvent::result(result));
    }
    emitter.emit(ProgressEvent::done());
}

async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatParams>, JsonRejection>,
) -> Response {
    let Json(params) = match payload {
        Ok(params) => params,
        Err(rejection) => return rejection_response(&rejection),
    };

    let (sink, rx) = ChannelSink::new();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let orchestrator = Arc::clone(&state.orchestrator);

    tokio::spawn(async move {
        let run_config = params.run_config();
        let outcome = orchestrator
            .run_with_cancel(
                &params.message,
                &params.history,
                &run_config,
                Some(&sink),
                run_cancel,
            )
            .await;
        finish_stream(&sink, outcome);
    });

    // Dropping the stream (client disconnect) cancels the run.
    let guard = cancel.drop_guard();
    let events = UnboundedReceiverStream::new(rx).map(move |message| {
        let _held = &guard;
        to_sse(message)
    });

    info!("streaming research run");
    Sse::new(events).into_response()
}

fn to_sse(message: SinkMessage) -> Result<Event, axum::Error> {
    match message {
        SinkMessage::Event(event) => Event::default().json_data(&event).inspect_err(|e| {
            warn!(error = %e, "failed to encode progress event");
        }),
        SinkMessage::KeepAlive => Ok(Event::default().comment("keep-alive")),
    }
}
