//! Collaborator interfaces.
//!
//! The pipeline only talks to the outside world through these traits:
//! - `HostingApi`: repository metadata, commits, issues, pull requests
//! - `RepositoryProvider`: builds a `HostingApi` and downloads file content
//! - `VerdictProvider`: asks a language model for a qualitative verdict
//! - `ResponseCache`: advisory response cache injected into HTTP clients
//!
//! In-memory implementations live in the `fakes` module.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::content::RepositoryContent;
use crate::error::{AnalysisError, FetchResult};
use crate::model::{Commit, Issue, LlmVerdict, PullRequest, RepositoryInfo};

/// Read access to one repository on the hosting service.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Repository metadata, or `None` when the repository does not exist.
    async fn repository_info(&self) -> FetchResult<Option<RepositoryInfo>>;

    /// Commits on `branch`, newest first.
    async fn commits(&self, branch: &str) -> FetchResult<Vec<Commit>>;

    async fn issues(&self) -> FetchResult<Vec<Issue>>;

    async fn pull_requests(&self) -> FetchResult<Vec<PullRequest>>;
}

/// Entry point to the hosting service for a whole batch.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    fn hosting(&self, owner: &str, repo: &str) -> Arc<dyn HostingApi>;

    /// Download the repository's files.
    async fn fetch_content(&self, owner: &str, repo: &str) -> FetchResult<RepositoryContent>;
}

/// Language-model collaborator.
#[async_trait]
pub trait VerdictProvider: Send + Sync {
    async fn request_verdict(&self, prompt: &str) -> Result<LlmVerdict, AnalysisError>;
}

/// Advisory key/value cache for HTTP responses.
///
/// Entries are written at most once per distinct request; a race that writes
/// the same entry twice only duplicates work.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, value: &[u8]);
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8]) {}
}

/// Cache key for a request: SHA-256 hex of its identity (usually the URL).
pub fn cache_key(request_identity: &str) -> String {
    hex::encode(Sha256::digest(request_identity.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_hex() {
        let a = cache_key("https://api.github.com/repos/a/b/commits");
        let b = cache_key("https://api.github.com/repos/a/b/commits");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_differs_per_request() {
        assert_ne!(cache_key("a"), cache_key("b"));
    }

    #[test]
    fn no_cache_never_hits() {
        let cache = NoCache;
        cache.set("k", b"v");
        assert!(cache.get("k").is_none());
    }
}
