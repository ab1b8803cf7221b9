//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]

use std::path::{Path, PathBuf};

use crate::agent::client::{create_executor, create_provider};
use crate::agent::config::{AgentConfig, ResearchMode, RunConfig};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::progress::TracingSink;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_run_result};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Parameters for the `ask` command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question to research.
    pub message: &'a str,
    /// Use deep research mode.
    pub deep: bool,
    /// File whose contents are supplied as context.
    pub context_file: Option<&'a Path>,
    /// Iteration budget override.
    pub max_iterations: Option<usize>,
    /// Continuation threshold override.
    pub min_tool_calls: Option<usize>,
    /// Model override.
    pub model: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Show per-step details.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask {
            message,
            deep,
            context_file,
            max_iterations,
            min_tool_calls,
            model,
            prompt_dir,
        } => {
            let params = AskParams {
                message,
                deep: *deep,
                context_file: context_file.as_deref(),
                max_iterations: *max_iterations,
                min_tool_calls: *min_tool_calls,
                model: model.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
                verbose: cli.verbose,
            };
            cmd_ask(&params, format)
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "server")]
        Commands::Serve { host, port } => cmd_serve(host, *port),
    }
}

/// Builds an orchestrator from the environment plus CLI overrides.
///
/// # Errors
///
/// Returns [`CommandError::ExecutionFailed`] if configuration is incomplete
/// or a client cannot be created.
pub fn build_orchestrator(model: Option<&str>, prompt_dir: Option<&Path>) -> Result<Orchestrator> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(model) = model {
        builder = builder.model(model);
    }
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }

    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;

    let executor = create_executor(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Search backend creation failed: {e}"))
    })?;

    Ok(Orchestrator::new(provider, executor, config))
}

/// Builds the run policy for an `ask` invocation.
///
/// # Errors
///
/// Returns [`CommandError::InvalidArgument`] if the context file cannot be
/// read or an override is zero.
pub fn run_config_for(params: &AskParams<'_>) -> Result<RunConfig> {
    let mode = if params.deep {
        ResearchMode::Deep
    } else {
        ResearchMode::Standard
    };
    let mut config = RunConfig::for_mode(mode);

    if let Some(n) = params.max_iterations {
        if n == 0 {
            return Err(
                CommandError::InvalidArgument("--max-iterations must be at least 1".to_string())
                    .into(),
            );
        }
        config = config.with_max_iterations(n);
    }
    if let Some(n) = params.min_tool_calls {
        config = config.with_min_tool_calls(n);
    }
    if let Some(path) = params.context_file {
        let context = std::fs::read_to_string(path).map_err(|e| {
            CommandError::InvalidArgument(format!(
                "Failed to read context file {}: {e}",
                path.display()
            ))
        })?;
        config = config.with_context(context);
    }

    Ok(config)
}

// ==================== Command Implementations ====================

fn cmd_ask(params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    if params.message.trim().is_empty() {
        return Err(CommandError::InvalidArgument("Message cannot be empty".to_string()).into());
    }

    let run_config = run_config_for(params)?;
    let orchestrator = build_orchestrator(params.model, params.prompt_dir)?;

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let sink = TracingSink;
    let result = rt.block_on(async {
        orchestrator
            .run(params.message, &[], &run_config, Some(&sink))
            .await
    });

    match result {
        Ok(run) => match format {
            OutputFormat::Text => Ok(format_run_result(&run, params.verbose)),
            OutputFormat::Json => serde_json::to_string_pretty(&run).map_err(|e| {
                CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into()
            }),
        },
        Err(failure) => Err(CommandError::ExecutionFailed(format!(
            "Research failed [{}]: {}",
            failure.code, failure.error
        ))
        .into()),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str(&format!(
                        "  {}\n",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    ));
                }
                output.push_str("\nEdit these files to customize the research prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Starts the HTTP server and runs it until Ctrl-C.
#[cfg(feature = "server")]
fn cmd_serve(host: &str, port: u16) -> Result<String> {
    use crate::server::serve;
    use std::sync::Arc;

    let orchestrator = build_orchestrator(None, None)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    rt.block_on(serve(Arc::new(orchestrator), host, port))
        .map_err(|e| CommandError::ExecutionFailed(format!("Server error: {e}")))?;

    Ok(String::new())
}
