//! Agentic web-research system.
//!
//! Drives a tool-calling LLM through search and page extraction until it
//! can answer, streaming progress to an optional sink. Uses a pluggable
//! provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! User message → Orchestrator
//!   ├── validate input, build transcript (system + history + user)
//!   ├── agentic_loop
//!   │   ├── Reasoning: LlmProvider::chat (tool choice per iteration)
//!   │   ├── ToolExecution: ToolExecutor::execute_all (concurrent)
//!   │   └── Continuation: deep mode below the tool-call minimum
//!   ├── Synthesis: tool-free completion when no answer was captured
//!   ├── Recovery: salvage → degraded synthesis → surface
//!   └── RunResult (deduplicated sources, steps, counts)
//! ```

pub mod agentic_loop;
pub mod backends;
pub mod client;
pub mod config;
pub mod executor;
pub mod message;
pub mod orchestrator;
pub mod outcome;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod recovery;
pub mod source;
pub mod step;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use backends::{BackendError, ExtractBackend, SearchBackend, TavilyClient};
pub use client::{create_executor, create_provider};
pub use config::{AgentConfig, ContinuationPolicy, ResearchMode, RunConfig};
pub use executor::{ToolExecutor, ToolOutcome};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage, ToolChoice};
pub use orchestrator::Orchestrator;
pub use outcome::{ErrorCode, RunFailure, RunResult, ToolCallCounts};
pub use progress::{ChannelSink, EventKind, ProgressEvent, ProgressSink, SinkMessage, TracingSink};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use source::{Source, dedupe_sources};
pub use step::{Step, StepDetail, StepStatus};
pub use tool::{ToolCall, ToolDefinition, ToolKind, ToolResult, ToolSet};
