//! Check evaluation.
//!
//! [`CheckEngine::run_check`] turns one [`CheckSpec`] into exactly one
//! [`CheckOutcome`] and never fails: unknown types, bad parameters and fetch
//! errors all become `ERROR` outcomes. Commit, issue and pull-request lists are
//! fetched on first use and reused for the rest of the student's checks.

use tracing::debug;

use crate::content::RepositoryContent;
use crate::error::{bounded, CheckError, FetchError, CHECK_DETAIL_LIMIT};
use crate::model::{CheckOutcome, Commit, Issue, PullRequest, RepositoryInfo};
use crate::provider::HostingApi;
use crate::spec::{Check, CheckKind, CheckSpec};

/// Evaluates checks for one student. Lives for one student's evaluation.
pub struct CheckEngine<'a> {
    hosting: &'a dyn HostingApi,
    content: &'a RepositoryContent,
    repository: Option<Option<RepositoryInfo>>,
    commits: Option<Vec<Commit>>,
    issues: Option<Vec<Issue>>,
    pull_requests: Option<Vec<PullRequest>>,
}

impl<'a> CheckEngine<'a> {
    pub fn new(hosting: &'a dyn HostingApi, content: &'a RepositoryContent) -> Self {
        Self {
            hosting,
            content,
            repository: None,
            commits: None,
            issues: None,
            pull_requests: None,
        }
    }

    /// Seed the metadata cache with an already fetched lookup.
    pub fn with_repository(mut self, repository: Option<RepositoryInfo>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Run every check in order. Never short-circuits.
    pub async fn run_all(&mut self, checks: &[CheckSpec]) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(checks.len());
        for check in checks {
            outcomes.push(self.run_check(check).await);
        }
        outcomes
    }

    pub async fn run_check(&mut self, spec: &CheckSpec) -> CheckOutcome {
        let Some(kind) = CheckKind::from_name(&spec.check_type) else {
            return CheckOutcome::error(
                &spec.id,
                &spec.description,
                format!("unknown check type: {}", spec.check_type),
            );
        };

        let outcome = match self.evaluate(kind, spec).await {
            Ok(true) => CheckOutcome::pass(&spec.id, &spec.description),
            Ok(false) => CheckOutcome::fail(&spec.id, &spec.description),
            Err(e) => CheckOutcome::error(
                &spec.id,
                &spec.description,
                bounded(
                    &format!("error while running check '{}': {}", spec.id, e),
                    CHECK_DETAIL_LIMIT,
                ),
            ),
        };
        debug!(check = %spec.id, status = outcome.status.as_str(), "Check evaluated");
        outcome
    }

    async fn evaluate(&mut self, kind: CheckKind, spec: &CheckSpec) -> Result<bool, CheckError> {
        match Check::decode(kind, &spec.params)? {
            Check::RepoExists => Ok(self.repository().await?.is_some()),
            Check::FileExists { path } => Ok(self.content.file_exists(&path)),
            Check::CommitMessageRegex { pattern } => {
                let commits = self.commits().await?;
                Ok(!commits.is_empty() && commits.iter().all(|c| pattern.is_match(&c.message)))
            }
            Check::IssuesCount {
                title_regex,
                min_count,
            } => {
                let count = self
                    .issues()
                    .await?
                    .iter()
                    .filter(|issue| title_regex.is_match(&issue.title))
                    .count();
                Ok(count as i64 >= min_count)
            }
            Check::PrMergedCount { min_count } => {
                let merged = self
                    .pull_requests()
                    .await?
                    .iter()
                    .filter(|pr| pr.merged_at.is_some())
                    .count();
                Ok(merged as i64 >= min_count)
            }
        }
    }

    /// Commit messages on the default branch, reusing the check cache.
    pub async fn commit_messages(&mut self) -> Result<Vec<String>, FetchError> {
        Ok(self
            .commits()
            .await?
            .iter()
            .map(|c| c.message.clone())
            .collect())
    }

    async fn repository(&mut self) -> Result<Option<&RepositoryInfo>, FetchError> {
        if self.repository.is_none() {
            let info = self.hosting.repository_info().await?;
            self.repository = Some(info);
        }
        Ok(self.repository.as_ref().and_then(Option::as_ref))
    }

    /// Commits on the default branch; empty when the repository is unknown.
    async fn commits(&mut self) -> Result<&[Commit], FetchError> {
        if self.commits.is_none() {
            let branch = self
                .repository()
                .await?
                .map(|info| info.default_branch.clone());
            let commits = match branch {
                Some(branch) => self.hosting.commits(&branch).await?,
                None => Vec::new(),
            };
            self.commits = Some(commits);
        }
        Ok(self.commits.as_deref().unwrap_or_default())
    }

    async fn issues(&mut self) -> Result<&[Issue], FetchError> {
        if self.issues.is_none() {
            self.issues = Some(self.hosting.issues().await?);
        }
        Ok(self.issues.as_deref().unwrap_or_default())
    }

    async fn pull_requests(&mut self) -> Result<&[PullRequest], FetchError> {
        if self.pull_requests.is_none() {
            self.pull_requests = Some(self.hosting.pull_requests().await?);
        }
        Ok(self.pull_requests.as_deref().unwrap_or_default())
    }
}
