//! Data model shared by the engine, the pipeline and the report writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Verdict string carried by the sentinel produced when the LLM call fails.
pub const ANALYSIS_FAILED_VERDICT: &str = "analysis_failed";

/// Rank used to sort error results below every valid score.
pub const ERROR_RANK: f64 = -1.0;

/// Repository metadata as reported by the hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub private: bool,
    pub default_branch: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub merged_at: Option<DateTime<Utc>>,
}

/// Outcome classification of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Error => "ERROR",
        }
    }
}

/// Result of evaluating one check for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub id: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub description: String,
    /// Diagnostic text; present for `ERROR` outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckOutcome {
    pub fn pass(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: CheckStatus::Pass,
            description: description.into(),
            details: None,
        }
    }

    pub fn fail(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: CheckStatus::Fail,
            description: description.into(),
            details: None,
        }
    }

    pub fn error(
        id: impl Into<String>,
        description: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: CheckStatus::Error,
            description: description.into(),
            details: Some(details.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// Per-task breakdown returned by the language model.
///
/// Models are loose about types here, so numbers and quotes stay as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    #[serde(default)]
    pub task_number: Option<serde_json::Value>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub argumentation: Option<String>,
    #[serde(default)]
    pub quotes: Option<serde_json::Value>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Qualitative assessment of a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub verdict: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub quotes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_analysis: Vec<TaskAnalysis>,
}

impl LlmVerdict {
    /// Sentinel verdict substituted when the analysis could not be obtained.
    pub fn analysis_failed(reason: impl Into<String>) -> Self {
        Self {
            verdict: ANALYSIS_FAILED_VERDICT.to_string(),
            reasons: vec![reason.into()],
            quotes: Vec::new(),
            task_analysis: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.verdict == ANALYSIS_FAILED_VERDICT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Success,
    Error,
}

/// Final outcome of the per-student pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_id: String,
    pub status: StudentStatus,
    pub score: f64,
    pub passed: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<CheckOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_verdict: Option<LlmVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

impl StudentResult {
    /// Build a success result, deriving the score from the outcomes.
    pub fn success(
        student_id: impl Into<String>,
        outcomes: Vec<CheckOutcome>,
        llm_verdict: Option<LlmVerdict>,
        repo_url: Option<String>,
    ) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        let total = outcomes.len();
        Self {
            student_id: student_id.into(),
            status: StudentStatus::Success,
            score: score(passed, total),
            passed,
            total,
            outcomes,
            llm_verdict,
            error: None,
            repo_url,
        }
    }

    pub fn failure(student_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            status: StudentStatus::Error,
            score: 0.0,
            passed: 0,
            total: 0,
            outcomes: Vec::new(),
            llm_verdict: None,
            error: Some(error.into()),
            repo_url: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StudentStatus::Success
    }

    /// Sort key for cohort tables: the score, or [`ERROR_RANK`] for failures.
    pub fn rank(&self) -> f64 {
        if self.is_success() {
            self.score
        } else {
            ERROR_RANK
        }
    }
}

/// `100 * passed / total`, or 0 when there are no checks.
pub fn score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

/// Aggregate record produced once at the end of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_students: usize,
    pub successful: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub average_seconds_per_student: f64,
    pub duplicate_suspects: usize,
    /// Sorted by descending score; error results last.
    pub results: Vec<StudentResult>,
}

impl CohortSummary {
    pub fn build(
        run_id: impl Into<String>,
        mut results: Vec<StudentResult>,
        elapsed_seconds: f64,
        duplicate_suspects: usize,
    ) -> Self {
        results.sort_by(|a, b| b.rank().partial_cmp(&a.rank()).unwrap_or(Ordering::Equal));
        let total_students = results.len();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let average_seconds_per_student = if total_students == 0 {
            0.0
        } else {
            elapsed_seconds / total_students as f64
        };

        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            total_students,
            successful,
            failed: total_students - successful,
            elapsed_seconds,
            average_seconds_per_student,
            duplicate_suspects,
            results,
        }
    }
}
