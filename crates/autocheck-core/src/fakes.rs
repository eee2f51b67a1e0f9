//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryRepositoryProvider`, `MemoryHosting`, `MemoryResponseCache`
//! and `ScriptedVerdicts` that satisfy the trait contracts without network
//! access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::content::RepositoryContent;
use crate::error::{AnalysisError, FetchError, FetchResult};
use crate::model::{Commit, Issue, LlmVerdict, PullRequest, RepositoryInfo};
use crate::provider::{HostingApi, RepositoryProvider, ResponseCache, VerdictProvider};

// ---------------------------------------------------------------------------
// FakeRepository
// ---------------------------------------------------------------------------

/// Scripted state of one student's repository.
#[derive(Debug, Clone, Default)]
pub struct FakeRepository {
    pub info: Option<RepositoryInfo>,
    pub commits: Vec<Commit>,
    pub issues: Vec<Issue>,
    pub pull_requests: Vec<PullRequest>,
    pub files: RepositoryContent,
    /// Error returned by every list fetch (commits, issues, pull requests).
    pub list_error: Option<FetchError>,
    pub content_error: Option<FetchError>,
    /// Panic inside `fetch_content`, to exercise task isolation.
    pub panic_on_content: bool,
}

impl FakeRepository {
    /// Reachable public repository on `main` with no files.
    pub fn public() -> Self {
        Self {
            info: Some(RepositoryInfo {
                private: false,
                default_branch: "main".to_string(),
                url: None,
            }),
            ..Self::default()
        }
    }

    pub fn private() -> Self {
        let mut repo = Self::public();
        if let Some(info) = repo.info.as_mut() {
            info.private = true;
        }
        repo
    }

    /// Repository that does not exist.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: &str) -> Self {
        if let Some(info) = self.info.as_mut() {
            info.url = Some(url.to_string());
        }
        self
    }

    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path, content);
        self
    }

    pub fn with_commit(mut self, message: &str) -> Self {
        let sha = format!("{:040x}", self.commits.len() + 1);
        self.commits.push(Commit {
            sha,
            message: message.to_string(),
        });
        self
    }

    pub fn with_issue(mut self, title: &str) -> Self {
        self.issues.push(Issue {
            title: title.to_string(),
        });
        self
    }

    pub fn with_merged_pr(mut self) -> Self {
        self.pull_requests.push(PullRequest {
            merged_at: Some(Utc::now()),
        });
        self
    }

    pub fn with_open_pr(mut self) -> Self {
        self.pull_requests.push(PullRequest { merged_at: None });
        self
    }

    pub fn failing_fetches(mut self, error: FetchError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn failing_content(mut self, error: FetchError) -> Self {
        self.content_error = Some(error);
        self
    }

    pub fn panicking_content(mut self) -> Self {
        self.panic_on_content = true;
        self
    }
}

// ---------------------------------------------------------------------------
// MemoryHosting
// ---------------------------------------------------------------------------

/// Number of calls made against a fake, per endpoint.
#[derive(Debug, Default)]
pub struct CallCounter {
    repository_info: AtomicUsize,
    commits: AtomicUsize,
    issues: AtomicUsize,
    pull_requests: AtomicUsize,
    content: AtomicUsize,
}

impl CallCounter {
    pub fn repository_info(&self) -> usize {
        self.repository_info.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn issues(&self) -> usize {
        self.issues.load(Ordering::SeqCst)
    }

    pub fn pull_requests(&self) -> usize {
        self.pull_requests.load(Ordering::SeqCst)
    }

    pub fn content(&self) -> usize {
        self.content.load(Ordering::SeqCst)
    }
}

/// `HostingApi` over a [`FakeRepository`].
#[derive(Debug)]
pub struct MemoryHosting {
    repo: FakeRepository,
    calls: Arc<CallCounter>,
}

impl MemoryHosting {
    pub fn new(repo: FakeRepository) -> Self {
        Self {
            repo,
            calls: Arc::new(CallCounter::default()),
        }
    }

    fn sharing(repo: FakeRepository, calls: Arc<CallCounter>) -> Self {
        Self { repo, calls }
    }

    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }

    fn list<T: Clone>(&self, items: &[T]) -> FetchResult<Vec<T>> {
        match &self.repo.list_error {
            Some(error) => Err(error.clone()),
            None => Ok(items.to_vec()),
        }
    }
}

#[async_trait]
impl HostingApi for MemoryHosting {
    async fn repository_info(&self) -> FetchResult<Option<RepositoryInfo>> {
        self.calls.repository_info.fetch_add(1, Ordering::SeqCst);
        Ok(self.repo.info.clone())
    }

    async fn commits(&self, _branch: &str) -> FetchResult<Vec<Commit>> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        self.list(&self.repo.commits)
    }

    async fn issues(&self) -> FetchResult<Vec<Issue>> {
        self.calls.issues.fetch_add(1, Ordering::SeqCst);
        self.list(&self.repo.issues)
    }

    async fn pull_requests(&self) -> FetchResult<Vec<PullRequest>> {
        self.calls.pull_requests.fetch_add(1, Ordering::SeqCst);
        self.list(&self.repo.pull_requests)
    }
}

// ---------------------------------------------------------------------------
// MemoryRepositoryProvider
// ---------------------------------------------------------------------------

/// `RepositoryProvider` keyed by owner. Unknown owners behave as missing
/// repositories.
#[derive(Debug, Default)]
pub struct MemoryRepositoryProvider {
    repos: HashMap<String, FakeRepository>,
    calls: Arc<CallCounter>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, owner: &str, repo: FakeRepository) -> Self {
        self.repos.insert(owner.to_string(), repo);
        self
    }

    /// Calls summed over every repository served by this provider.
    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }

    fn repo(&self, owner: &str) -> FakeRepository {
        self.repos.get(owner).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    fn hosting(&self, owner: &str, _repo: &str) -> Arc<dyn HostingApi> {
        Arc::new(MemoryHosting::sharing(
            self.repo(owner),
            Arc::clone(&self.calls),
        ))
    }

    async fn fetch_content(&self, owner: &str, repo: &str) -> FetchResult<RepositoryContent> {
        self.calls.content.fetch_add(1, Ordering::SeqCst);
        let fake = self.repo(owner);
        if fake.panic_on_content {
            panic!("scripted panic while downloading {owner}/{repo}");
        }
        if let Some(error) = fake.content_error {
            return Err(error);
        }
        if fake.info.is_none() {
            return Err(FetchError::NotFound(format!("{owner}/{repo}")));
        }
        Ok(fake.files)
    }
}

// ---------------------------------------------------------------------------
// MemoryResponseCache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryResponseCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
    }
}

// ---------------------------------------------------------------------------
// ScriptedVerdicts
// ---------------------------------------------------------------------------

/// `VerdictProvider` that returns a fixed verdict or a fixed failure and
/// records every prompt it receives.
#[derive(Debug)]
pub struct ScriptedVerdicts {
    response: Result<LlmVerdict, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVerdicts {
    pub fn returning(verdict: LlmVerdict) -> Self {
        Self {
            response: Ok(verdict),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl VerdictProvider for ScriptedVerdicts {
    async fn request_verdict(&self, prompt: &str) -> Result<LlmVerdict, AnalysisError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        match &self.response {
            Ok(verdict) => Ok(verdict.clone()),
            Err(reason) => Err(AnalysisError::Request(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_owner_is_missing() {
        let provider = MemoryRepositoryProvider::new();
        let hosting = provider.hosting("ghost", "lab");
        assert!(hosting.repository_info().await.unwrap().is_none());
        let err = provider.fetch_content("ghost", "lab").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn provider_counts_calls_across_repos() {
        let provider = MemoryRepositoryProvider::new()
            .with_repo("a", FakeRepository::public())
            .with_repo("b", FakeRepository::public());
        provider.hosting("a", "lab").repository_info().await.unwrap();
        provider.hosting("b", "lab").repository_info().await.unwrap();
        assert_eq!(provider.calls().repository_info(), 2);
    }

    #[tokio::test]
    async fn list_error_applies_to_all_lists() {
        let hosting = MemoryHosting::new(
            FakeRepository::public().failing_fetches(FetchError::AccessDenied("x".into())),
        );
        assert!(hosting.commits("main").await.is_err());
        assert!(hosting.issues().await.is_err());
        assert!(hosting.pull_requests().await.is_err());
        assert!(hosting.repository_info().await.is_ok());
    }

    #[tokio::test]
    async fn scripted_verdicts_record_prompts() {
        let verdicts = ScriptedVerdicts::failing("quota exceeded");
        let err = verdicts.request_verdict("hello").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(verdicts.prompts(), vec!["hello".to_string()]);
    }

    #[test]
    fn memory_cache_roundtrip() {
        let cache = MemoryResponseCache::new();
        assert!(cache.get("k").is_none());
        cache.set("k", b"v");
        assert_eq!(cache.get("k"), Some(b"v".to_vec()));
        assert_eq!(cache.len(), 1);
    }
}
