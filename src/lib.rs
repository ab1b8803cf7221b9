//! # sleuth
//!
//! Agentic web research: a tool-calling LLM loop over web search and page
//! extraction, with streamed progress and cited sources.
//!
//! ## Overview
//!
//! A research run sends the user's question to an `OpenAI`-compatible model
//! that may call `web_search` and `extract_content`. Tool calls run
//! concurrently; their results are fed back until the model answers, the
//! iteration budget is spent, or the run is cancelled. Deep mode enforces
//! a minimum number of tool calls before a tool-free answer is accepted.
//!
//! ## Example
//!
//! ```no_run
//! use sleuth::agent::{AgentConfig, Orchestrator, RunConfig, create_executor, create_provider};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let orchestrator = Orchestrator::new(
//!     create_provider(&config)?,
//!     create_executor(&config)?,
//!     config,
//! );
//! let result = orchestrator
//!     .run("What changed in Rust 1.88?", &[], &RunConfig::standard(), None)
//!     .await?;
//! println!("{}", result.final_text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
#[cfg(feature = "server")]
pub mod server;

pub use agent::{
    AgentConfig, ErrorCode, Orchestrator, ProgressEvent, ProgressSink, ResearchMode, RunConfig,
    RunFailure, RunResult, Source, Step,
};
pub use error::{AgentError, CommandError, Error, Result};
