//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sleuth: agentic web research from the command line.
///
/// Drives a tool-calling LLM through web search and page extraction
/// until it can answer a question with cited sources.
#[derive(Parser, Debug)]
#[command(name = "sleuth")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the answer with its sources.
    ///
    /// Requires a model API key (`OPENAI_API_KEY` or `SLEUTH_API_KEY`) and
    /// a search key (`TAVILY_API_KEY`).
    #[command(after_help = r#"Examples:
  sleuth ask "What changed in Rust 1.88?"
  sleuth ask "Compare tokio and async-std in 2025" --deep
  sleuth ask "Summarize this" --context-file notes.md
  sleuth ask "Latest CPython release" --max-iterations 3 --model gpt-4.1
  sleuth --format json ask "Who maintains serde?" | jq '.sources'
"#)]
    Ask {
        /// The question to research.
        message: String,

        /// Use deep research mode (more iterations, a tool-call minimum).
        #[arg(long)]
        deep: bool,

        /// Answer from the contents of this file instead of the web.
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Maximum reasoning iterations.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Minimum tool calls before a tool-free answer is accepted.
        #[arg(long)]
        min_tool_calls: Option<usize>,

        /// Model override.
        #[arg(long, env = "SLEUTH_MODEL")]
        model: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long, env = "SLEUTH_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  sleuth init-prompts                       # ~/.config/sleuth/prompts
  sleuth init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory (defaults to ~/.config/sleuth/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Serve the research API over HTTP with server-sent events.
    #[cfg(feature = "server")]
    #[command(after_help = r#"Examples:
  sleuth serve                       # listen on 127.0.0.1:3000
  sleuth serve --host 0.0.0.0 --port 8080
"#)]
    Serve {
        /// Host address to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}
