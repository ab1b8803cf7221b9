//! Research steps recorded for each tool invocation.
//!
//! A step is created when a search or extraction begins, completed exactly
//! once, and then kept for the transcript returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The backend call is in flight.
    Running,
    /// The backend call succeeded.
    Done,
    /// Argument parsing or the backend call failed.
    Error,
}

/// What a step is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepDetail {
    /// A web search.
    Searching {
        /// The search query.
        query: String,
    },
    /// A page extraction.
    Reading {
        /// URLs being read.
        urls: Vec<String>,
    },
}

/// A single research step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique step ID.
    pub id: String,
    /// Step kind and its input.
    #[serde(flatten)]
    pub detail: StepDetail,
    /// Current status.
    pub status: StepStatus,
    /// Number of results (search hits or pages read), set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
    /// When the step started.
    pub timestamp: DateTime<Utc>,
}

impl Step {
    /// Starts a search step.
    #[must_use]
    pub fn searching(query: impl Into<String>) -> Self {
        Self::start(StepDetail::Searching {
            query: query.into(),
        })
    }

    /// Starts a reading step.
    #[must_use]
    pub fn reading(urls: Vec<String>) -> Self {
        Self::start(StepDetail::Reading { urls })
    }

    fn start(detail: StepDetail) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            detail,
            status: StepStatus::Running,
            result_count: None,
            timestamp: Utc::now(),
        }
    }

    /// Marks the step done with a result count.
    pub const fn complete(&mut self, result_count: usize) {
        self.status = StepStatus::Done;
        self.result_count = Some(result_count);
    }

    /// Marks the step failed.
    pub const fn fail(&mut self) {
        self.status = StepStatus::Error;
        self.result_count = Some(0);
    }

    /// Returns `true` for search steps.
    #[must_use]
    pub const fn is_search(&self) -> bool {
        matches!(self.detail, StepDetail::Searching { .. })
    }
}
