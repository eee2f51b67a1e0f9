//! Batch coordinator.
//!
//! Runs the per-student pipeline for every roster entry on a bounded pool,
//! waits for all of them, then runs duplicate detection once and writes the
//! cohort artifacts.
//!
//! Phases: `Loading → Dispatching → Collecting → Deduplicating → Aggregating → Done`.
//! Only `Loading` can abort the run.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::duplicates::{DuplicateDetector, DuplicateReport, DEFAULT_THRESHOLD};
use crate::error::{bounded, AutocheckError, ConfigError, Result, STUDENT_ERROR_LIMIT};
use crate::model::{CohortSummary, StudentResult};
use crate::pipeline::StudentPipeline;
use crate::provider::{RepositoryProvider, VerdictProvider};
use crate::reporting;
use crate::roster::load_roster;
use crate::spec::LabSpec;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "results";

const TASK_LOST: &str = "internal error: evaluation task did not complete";

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Maximum number of students evaluated at once.
    pub workers: usize,
    pub detect_duplicates: bool,
    pub duplicate_threshold: f64,
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            detect_duplicates: true,
            duplicate_threshold: DEFAULT_THRESHOLD,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            return Err(ConfigError::InvalidSetting {
                name: "duplicate_threshold",
                reason: format!("{} is outside [0, 1]", self.duplicate_threshold),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Loading,
    Dispatching,
    Collecting,
    Deduplicating,
    Aggregating,
    Done,
}

impl BatchPhase {
    pub fn name(&self) -> &'static str {
        match self {
            BatchPhase::Loading => "LOADING",
            BatchPhase::Dispatching => "DISPATCHING",
            BatchPhase::Collecting => "COLLECTING",
            BatchPhase::Deduplicating => "DEDUPLICATING",
            BatchPhase::Aggregating => "AGGREGATING",
            BatchPhase::Done => "DONE",
        }
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: CohortSummary,
    pub duplicates: DuplicateReport,
}

pub struct BatchCoordinator {
    provider: Arc<dyn RepositoryProvider>,
    verdicts: Option<Arc<dyn VerdictProvider>>,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(provider: Arc<dyn RepositoryProvider>, config: BatchConfig) -> Self {
        Self {
            provider,
            verdicts: None,
            config,
        }
    }

    pub fn with_verdicts(mut self, verdicts: Arc<dyn VerdictProvider>) -> Self {
        self.verdicts = Some(verdicts);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Load the roster and the lab spec from disk, then run the batch.
    /// `repo_name` overrides the spec's repository name when given.
    pub async fn run_files(
        &self,
        roster_path: &Path,
        spec_path: &Path,
        repo_name: Option<&str>,
    ) -> Result<BatchOutcome> {
        enter(BatchPhase::Loading);
        let roster = load_roster(roster_path)?;
        let mut spec = LabSpec::load(spec_path)?;
        if let Some(name) = repo_name {
            spec = spec.with_repo_name(name);
        }
        self.run(roster, spec).await
    }

    /// Run the batch over an already loaded roster and spec.
    pub async fn run(&self, roster: Vec<String>, spec: LabSpec) -> Result<BatchOutcome> {
        let started = Instant::now();
        self.config.validate()?;
        spec.validate()?;
        if roster.is_empty() {
            return Err(ConfigError::EmptyRoster("<in-memory roster>".to_string()).into());
        }
        std::fs::create_dir_all(&self.config.output_dir)?;

        enter(BatchPhase::Dispatching);
        let detector = self
            .config
            .detect_duplicates
            .then(|| Arc::new(DuplicateDetector::new(self.config.duplicate_threshold)));
        let pipeline = Arc::new(self.pipeline(spec, detector.clone()));
        let mut tasks = self.dispatch(&roster, &pipeline);

        enter(BatchPhase::Collecting);
        let total = roster.len();
        let mut results: Vec<StudentResult> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    log_progress(results.len() + 1, total, &result);
                    results.push(result);
                }
                Err(e) => error!(error = %e, "Student task was cancelled"),
            }
        }
        for student in unfinished(&roster, &results) {
            let result = StudentResult::failure(&student, TASK_LOST);
            log_progress(results.len() + 1, total, &result);
            results.push(result);
        }

        enter(BatchPhase::Deduplicating);
        let duplicates = detector.map(|d| d.report()).unwrap_or_default();
        self.annotate_duplicates(&results, &duplicates);
        reporting::write_duplicate_report(&self.config.output_dir, &duplicates)
            .map_err(report_error)?;
        if !duplicates.is_empty() {
            warn!(suspects = duplicates.len(), "Duplicate submissions detected");
        }

        enter(BatchPhase::Aggregating);
        let summary = CohortSummary::build(
            Uuid::new_v4().to_string(),
            results,
            started.elapsed().as_secs_f64(),
            duplicates.len(),
        );
        reporting::write_batch_summary_json(&self.config.output_dir, &summary)
            .map_err(report_error)?;
        reporting::write_batch_summary_md(&self.config.output_dir, &summary)
            .map_err(report_error)?;

        enter(BatchPhase::Done);
        info!(
            run_id = %summary.run_id,
            students = summary.total_students,
            successful = summary.successful,
            failed = summary.failed,
            elapsed_secs = summary.elapsed_seconds,
            "Batch complete"
        );
        Ok(BatchOutcome {
            summary,
            duplicates,
        })
    }

    fn pipeline(&self, spec: LabSpec, detector: Option<Arc<DuplicateDetector>>) -> StudentPipeline {
        let mut pipeline = StudentPipeline::new(
            Arc::clone(&self.provider),
            Arc::new(spec),
            self.config.output_dir.clone(),
        );
        if let Some(detector) = detector {
            pipeline = pipeline.with_detector(detector);
        }
        if let Some(verdicts) = &self.verdicts {
            pipeline = pipeline.with_verdicts(Arc::clone(verdicts));
        }
        pipeline
    }

    /// Spawn one task per roster entry. Each task holds a pool permit while its
    /// pipeline runs in a nested task, so a panic is caught as a join error and
    /// still yields a result for that student.
    fn dispatch(&self, roster: &[String], pipeline: &Arc<StudentPipeline>) -> JoinSet<StudentResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        for student in roster.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(pipeline);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let id = student.clone();
                let run = tokio::spawn(async move { pipeline.run(&id).await });
                match run.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(student = %student, error = %e, "Student pipeline panicked");
                        StudentResult::failure(
                            &student,
                            bounded(&format!("internal error: {e}"), STUDENT_ERROR_LIMIT),
                        )
                    }
                }
            });
        }
        tasks
    }

    /// Re-render the summaries of flagged students with their top matches.
    fn annotate_duplicates(&self, results: &[StudentResult], duplicates: &DuplicateReport) {
        for result in results.iter().filter(|r| r.is_success()) {
            let Some(matches) = duplicates.get(&result.student_id) else {
                continue;
            };
            let dir = self.config.output_dir.join(&result.student_id);
            if let Err(e) = reporting::write_student_summary_md(&dir, result, matches) {
                warn!(student = %result.student_id, error = %e, "Failed to annotate summary");
            }
        }
    }
}

/// Roster entries with no collected result, one per missing occurrence.
fn unfinished(roster: &[String], results: &[StudentResult]) -> Vec<String> {
    let mut collected: HashMap<&str, usize> = HashMap::new();
    for result in results {
        *collected.entry(result.student_id.as_str()).or_default() += 1;
    }
    roster
        .iter()
        .filter(|student| match collected.get_mut(student.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

fn enter(phase: BatchPhase) {
    info!(phase = %phase, "Batch phase");
}

fn log_progress(done: usize, total: usize, result: &StudentResult) {
    if result.is_success() {
        info!(
            "[{}/{}] {}: {}",
            done,
            total,
            result.student_id,
            reporting::format_score(result.score)
        );
    } else {
        info!(
            "[{}/{}] {}: error ({})",
            done,
            total,
            result.student_id,
            result.error.as_deref().unwrap_or("unknown")
        );
    }
}

fn report_error(e: anyhow::Error) -> AutocheckError {
    AutocheckError::Report(format!("{e:#}"))
}
