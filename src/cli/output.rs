//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::{RunResult, StepDetail, StepStatus};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, falling back to text for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON.
    ///
    /// Serialization failures are reported inline as a JSON error object.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
    }
}

/// Formats a research result as text: the answer, then sources and stats.
#[must_use]
pub fn format_run_result(result: &RunResult, verbose: bool) -> String {
    let mut output = result.final_text.trim_end().to_string();

    if !result.sources.is_empty() {
        output.push_str("\n\nSources:");
        for (i, source) in result.sources.iter().enumerate() {
            let _ = write!(output, "\n  [{}] {} ({})", i + 1, source.title, source.url);
        }
    }

    let _ = write!(
        output,
        "\n\n---\nIterations: {} | Tool calls: {} ({} search, {} extract) | Continuations: {} | Synthesized: {} | Tokens: {} | Time: {:.1}s",
        result.iterations_used,
        result.tool_calls_used,
        result.tool_calls_by_kind.search,
        result.tool_calls_by_kind.extract,
        result.continuations_forced,
        if result.synthesized { "yes" } else { "no" },
        result.usage.total_tokens,
        elapsed_secs(result.elapsed_ms),
    );

    if verbose {
        for step in &result.steps {
            let status = match step.status {
                StepStatus::Running => "running",
                StepStatus::Done => "ok",
                StepStatus::Error => "error",
            };
            let subject = match &step.detail {
                StepDetail::Searching { query } => format!("search \"{query}\""),
                StepDetail::Reading { urls } => format!("read {}", urls.join(", ")),
            };
            let _ = write!(output, "\nStep [{status}] {subject}");
        }
    }

    output
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Source, Step, TokenUsage, ToolCallCounts};

    fn sample() -> RunResult {
        RunResult {
            final_text: "Rust 1.88 shipped let chains.\n".to_string(),
            search_performed: true,
            sources: vec![Source::new("Rust Blog", "https://blog.rust-lang.org/", None)],
            steps: vec![Step::searching("rust 1.88 release")],
            iterations_used: 2,
            tool_calls_used: 1,
            tool_calls_by_kind: ToolCallCounts {
                search: 1,
                extract: 0,
            },
            continuations_forced: 0,
            synthesized: false,
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            },
            elapsed_ms: 2500,
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_run_result_lists_sources_and_stats() {
        let text = format_run_result(&sample(), false);
        assert!(text.starts_with("Rust 1.88 shipped let chains."));
        assert!(text.contains("[1] Rust Blog (https://blog.rust-lang.org/)"));
        assert!(text.contains("Tool calls: 1 (1 search, 0 extract)"));
        assert!(text.contains("Tokens: 120"));
        assert!(text.contains("Time: 2.5s"));
        assert!(!text.contains("Step ["));
    }

    #[test]
    fn test_format_run_result_verbose_lists_steps() {
        let text = format_run_result(&sample(), true);
        assert!(text.contains("search \"rust 1.88 release\""));
    }

    #[test]
    fn test_to_json_uses_camel_case() {
        let json = OutputFormat::Json.to_json(&sample());
        assert!(json.contains("\"toolCallsUsed\": 1"));
        assert!(json.contains("\"finalText\""));
    }
}
