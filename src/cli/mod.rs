//! CLI layer for sleuth.
//!
//! Provides the command-line interface using clap, with commands for
//! running research, managing prompt templates, and serving the HTTP API.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
