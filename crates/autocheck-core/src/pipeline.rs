//! Per-student evaluation pipeline.
//!
//! One call to [`StudentPipeline::run`] produces exactly one [`StudentResult`].
//! Any error raised along the way becomes an error result with a bounded
//! message; nothing escapes to the caller.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{self, PromptContext};
use crate::content::RepositoryContent;
use crate::duplicates::DuplicateDetector;
use crate::engine::CheckEngine;
use crate::error::{bounded, STUDENT_ERROR_LIMIT};
use crate::model::StudentResult;
use crate::provider::{RepositoryProvider, VerdictProvider};
use crate::reporting;
use crate::spec::LabSpec;

pub const REPO_UNAVAILABLE: &str = "repository not found or inaccessible";
pub const REPO_PRIVATE: &str = "repository is private";

const README_PATH: &str = "README.md";

pub struct StudentPipeline {
    provider: Arc<dyn RepositoryProvider>,
    spec: Arc<LabSpec>,
    output_dir: PathBuf,
    verdicts: Option<Arc<dyn VerdictProvider>>,
    detector: Option<Arc<DuplicateDetector>>,
}

impl StudentPipeline {
    pub fn new(
        provider: Arc<dyn RepositoryProvider>,
        spec: Arc<LabSpec>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            spec,
            output_dir: output_dir.into(),
            verdicts: None,
            detector: None,
        }
    }

    /// Request an LLM verdict for every reachable repository.
    pub fn with_verdicts(mut self, verdicts: Arc<dyn VerdictProvider>) -> Self {
        self.verdicts = Some(verdicts);
        self
    }

    /// Register every fetched snapshot with `detector`.
    pub fn with_detector(mut self, detector: Arc<DuplicateDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn spec(&self) -> &LabSpec {
        &self.spec
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn run(&self, student_id: &str) -> StudentResult {
        match self.evaluate(student_id).await {
            Ok(result) => result,
            Err(e) => {
                warn!(student = %student_id, error = %e, "Student evaluation failed");
                StudentResult::failure(student_id, bounded(&format!("{e:#}"), STUDENT_ERROR_LIMIT))
            }
        }
    }

    async fn evaluate(&self, student_id: &str) -> Result<StudentResult> {
        let dir = reporting::prepare_student_dir(&self.output_dir, student_id)?;
        let repo_name = self.spec.repo_name.as_str();
        debug!(student = %student_id, repo = %repo_name, "Evaluating student");

        let hosting = self.provider.hosting(student_id, repo_name);
        let info = match hosting.repository_info().await {
            Ok(Some(info)) => info,
            Ok(None) => return terminal(&dir, student_id, REPO_UNAVAILABLE),
            Err(e) => {
                warn!(student = %student_id, error = %e, "Repository lookup failed");
                return terminal(&dir, student_id, REPO_UNAVAILABLE);
            }
        };
        if info.private {
            return terminal(&dir, student_id, REPO_PRIVATE);
        }

        let content = match self.provider.fetch_content(student_id, repo_name).await {
            Ok(content) => content,
            Err(e) => {
                warn!(student = %student_id, error = %e, "Content download failed; file checks will fail");
                RepositoryContent::empty()
            }
        };

        if let Some(detector) = &self.detector {
            detector.register(student_id, &content);
        }

        let mut engine = CheckEngine::new(hosting.as_ref(), &content).with_repository(Some(info.clone()));
        let outcomes = engine.run_all(&self.spec.checks).await;

        let verdict = match &self.verdicts {
            Some(verdicts) => {
                let context = PromptContext {
                    readme: content.read_file(README_PATH),
                    commit_messages: engine.commit_messages().await.unwrap_or_default(),
                    tasks: self.spec.checks.iter().map(|c| c.label().to_string()).collect(),
                };
                Some(analysis::analyze(verdicts.as_ref(), &context).await)
            }
            None => None,
        };

        let result = StudentResult::success(student_id, outcomes, verdict, info.url.clone());
        reporting::write_student_report(&dir, &result, &[])?;
        info!(
            student = %student_id,
            passed = result.passed,
            total = result.total,
            "Student evaluated"
        );
        Ok(result)
    }
}

/// Write the failure report and return the matching error result.
fn terminal(dir: &Path, student_id: &str, reason: &str) -> Result<StudentResult> {
    info!(student = %student_id, reason, "Student evaluation stopped");
    reporting::write_failure_report(dir, student_id, reason)?;
    Ok(StudentResult::failure(student_id, reason))
}
