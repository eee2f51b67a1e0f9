//! Report artifacts.
//!
//! Per student, under `<output>/<student>/`:
//! - `results.jsonl`: summary record, then one record per check outcome
//! - `summary.md`: human-readable report (or the failure reason only)
//!
//! Per batch, under `<output>/`:
//! - `batch_summary.json` / `batch_summary.md`
//! - `duplicate_report.json`, only when someone is flagged

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::duplicates::{DuplicateMatch, DuplicateReport};
use crate::model::{CheckStatus, CohortSummary, LlmVerdict, StudentResult};

pub const RESULTS_FILE: &str = "results.jsonl";
pub const SUMMARY_FILE: &str = "summary.md";
pub const BATCH_SUMMARY_JSON: &str = "batch_summary.json";
pub const BATCH_SUMMARY_MD: &str = "batch_summary.md";
pub const DUPLICATE_REPORT_FILE: &str = "duplicate_report.json";

/// Duplicate matches shown in a student's summary.
const SHOWN_MATCHES: usize = 3;

/// First line of `results.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentSummaryRecord {
    pub student_id: String,
    /// Score with two decimals and a percent sign, e.g. `50.00%`.
    pub score: String,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub errored_checks: usize,
    pub total_checks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<LlmVerdict>,
}

impl StudentSummaryRecord {
    pub fn from_result(result: &StudentResult) -> Self {
        let count = |status: CheckStatus| result.outcomes.iter().filter(|o| o.status == status).count();
        Self {
            student_id: result.student_id.clone(),
            score: format_score(result.score),
            passed_checks: count(CheckStatus::Pass),
            failed_checks: count(CheckStatus::Fail),
            errored_checks: count(CheckStatus::Error),
            total_checks: result.outcomes.len(),
            llm_analysis: result.llm_verdict.clone(),
        }
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.2}%", score)
}

/// Create `<output>/<student>` and remove artifacts from a previous run.
pub fn prepare_student_dir(output_dir: &Path, student_id: &str) -> Result<PathBuf> {
    let dir = output_dir.join(student_id);
    std::fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
    for name in [SUMMARY_FILE, RESULTS_FILE] {
        let stale = dir.join(name);
        match std::fs::remove_file(&stale) {
            Ok(()) => {}
            // Already gone, possibly removed by a repeated roster entry.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {:?}", stale)),
        }
    }
    Ok(dir)
}

/// Render `results.jsonl`: one summary record, then one line per outcome.
pub fn render_results_jsonl(result: &StudentResult) -> Result<String> {
    let mut out = serde_json::to_string(&StudentSummaryRecord::from_result(result))
        .context("serialize summary record")?;
    out.push('\n');
    for outcome in &result.outcomes {
        out.push_str(&serde_json::to_string(outcome).context("serialize check outcome")?);
        out.push('\n');
    }
    Ok(out)
}

/// Render `summary.md` for a successful evaluation.
pub fn render_student_summary_md(result: &StudentResult, duplicates: &[DuplicateMatch]) -> String {
    let record = StudentSummaryRecord::from_result(result);
    let mut out = String::new();

    match &result.repo_url {
        Some(url) => out.push_str(&format!(
            "# Report: [{}]({}) - {}\n\n",
            result.student_id, url, record.score
        )),
        None => out.push_str(&format!("# Report: {} - {}\n\n", result.student_id, record.score)),
    }

    if !duplicates.is_empty() {
        out.push_str("## Duplicate Suspicion\n");
        for m in duplicates.iter().take(SHOWN_MATCHES) {
            out.push_str(&format!(
                "- `{}`: similarity {:.0}%, {} identical of {} common files\n",
                m.suspect_id,
                m.similarity_score * 100.0,
                m.identical_files.len(),
                m.common_files
            ));
        }
        out.push('\n');
    }

    if let Some(verdict) = &result.llm_verdict {
        render_verdict(&mut out, verdict);
    }

    out.push_str("## Automated Checks\n");
    out.push_str(&format!(
        "- passed: {}\n- failed: {}\n- errors: {}\n\n",
        record.passed_checks, record.failed_checks, record.errored_checks
    ));

    if !result.outcomes.is_empty() {
        out.push_str("| ID | Status | Description |\n|---|---|---|\n");
        for outcome in &result.outcomes {
            let description = match &outcome.details {
                Some(details) => format!("{} ({})", outcome.description, details),
                None => outcome.description.clone(),
            };
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                outcome.id,
                outcome.status.as_str(),
                escape_cell(&description)
            ));
        }
    }
    out
}

fn render_verdict(out: &mut String, verdict: &LlmVerdict) {
    out.push_str("## LLM Analysis\n");
    out.push_str(&format!("**Verdict:** {}\n\n", verdict.verdict));

    if !verdict.task_analysis.is_empty() {
        out.push_str("### Tasks\n");
        for task in &verdict.task_analysis {
            let number = task
                .task_number
                .as_ref()
                .map(|n| n.to_string().trim_matches('"').to_string())
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!(
                "- **Task {}: {}** - {}\n",
                number,
                task.task_name.as_deref().unwrap_or("unnamed task"),
                task.result.as_deref().unwrap_or("no result")
            ));
            if let Some(argumentation) = &task.argumentation {
                out.push_str(&format!("  - {}\n", argumentation));
            }
            if let Some(link) = &task.link {
                out.push_str(&format!("  - <{}>\n", link));
            }
        }
        out.push('\n');
    }

    if !verdict.reasons.is_empty() {
        out.push_str("### Reasons\n");
        for reason in &verdict.reasons {
            out.push_str(&format!("- {}\n", reason));
        }
        out.push('\n');
    }

    if !verdict.quotes.is_empty() {
        out.push_str("### Quotes\n");
        for quote in &verdict.quotes {
            out.push_str(&format!("> {}\n", quote));
        }
        out.push('\n');
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render `summary.md` for a student whose evaluation stopped early.
pub fn render_failure_md(student_id: &str, reason: &str) -> String {
    format!("# Report: {}\n\n## Evaluation failed\n{}\n", student_id, reason)
}

pub fn write_student_report(
    dir: &Path,
    result: &StudentResult,
    duplicates: &[DuplicateMatch],
) -> Result<()> {
    let jsonl = render_results_jsonl(result)?;
    let path = dir.join(RESULTS_FILE);
    std::fs::write(&path, jsonl).with_context(|| format!("write {:?}", path))?;
    write_student_summary_md(dir, result, duplicates)
}

/// Write (or rewrite) `summary.md` only.
pub fn write_student_summary_md(
    dir: &Path,
    result: &StudentResult,
    duplicates: &[DuplicateMatch],
) -> Result<()> {
    let path = dir.join(SUMMARY_FILE);
    let md = render_student_summary_md(result, duplicates);
    std::fs::write(&path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

pub fn write_failure_report(dir: &Path, student_id: &str, reason: &str) -> Result<()> {
    let path = dir.join(SUMMARY_FILE);
    std::fs::write(&path, render_failure_md(student_id, reason))
        .with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write `duplicate_report.json` when the report is non-empty. Returns whether
/// a file was written.
pub fn write_duplicate_report(output_dir: &Path, report: &DuplicateReport) -> Result<bool> {
    if report.is_empty() {
        return Ok(false);
    }
    let path = output_dir.join(DUPLICATE_REPORT_FILE);
    let content = serde_json::to_string_pretty(report).context("serialize duplicate report")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(true)
}

pub fn write_batch_summary_json(output_dir: &Path, summary: &CohortSummary) -> Result<()> {
    let path = output_dir.join(BATCH_SUMMARY_JSON);
    let content = serde_json::to_string_pretty(summary).context("serialize batch summary")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

pub fn render_batch_summary_md(summary: &CohortSummary) -> String {
    let mut out = String::new();
    out.push_str("# Batch Summary\n\n");
    out.push_str(&format!(
        "- run: `{}`\n- generated: {}\n- students: {}\n- successful: {}\n- failed: {}\n- elapsed: {:.1}s\n- average per student: {:.1}s\n",
        summary.run_id,
        summary.generated_at.to_rfc3339(),
        summary.total_students,
        summary.successful,
        summary.failed,
        summary.elapsed_seconds,
        summary.average_seconds_per_student
    ));
    if summary.duplicate_suspects > 0 {
        out.push_str(&format!(
            "- duplicate suspects: {}\n",
            summary.duplicate_suspects
        ));
    }
    out.push('\n');

    out.push_str("| Student | Score | Status | Report |\n|---|---|---|---|\n");
    for result in &summary.results {
        let (score, status) = if result.is_success() {
            (format_score(result.score), "success".to_string())
        } else {
            (
                "-".to_string(),
                format!("error: {}", result.error.as_deref().unwrap_or("unknown")),
            )
        };
        out.push_str(&format!(
            "| {} | {} | {} | [summary]({}/{}) |\n",
            result.student_id,
            score,
            escape_cell(&status),
            result.student_id,
            SUMMARY_FILE
        ));
    }
    out
}

pub fn write_batch_summary_md(output_dir: &Path, summary: &CohortSummary) -> Result<()> {
    let path = output_dir.join(BATCH_SUMMARY_MD);
    std::fs::write(&path, render_batch_summary_md(summary))
        .with_context(|| format!("write {:?}", path))?;
    Ok(())
}
