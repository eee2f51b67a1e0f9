//! GitHub REST client.
//!
//! Repository metadata is always fetched fresh. Commit, issue and pull-request
//! listings go through the injected [`ResponseCache`]. Archives are
//! downloaded with `/zipball` and decoded in memory.

use std::sync::Arc;

use async_trait::async_trait;
use autocheck_core::{
    cache_key, Commit, FetchError, FetchResult, HostingApi, Issue, PullRequest, RepositoryContent,
    RepositoryInfo, RepositoryProvider, ResponseCache,
};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::archive::read_zipball;
use crate::error::{status_error, transport_error, RemoteError, Result};

pub const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("autocheck/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API_URL.to_string(),
            token: None,
        }
    }
}

impl GitHubConfig {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

// Wire types, trimmed to the fields we read.

#[derive(Debug, Deserialize)]
struct RepoResponse {
    #[serde(default)]
    private: bool,
    #[serde(default = "default_branch")]
    default_branch: String,
    html_url: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    merged_at: Option<DateTime<Utc>>,
}

/// Outcome of a GET that reached the server.
enum Reply<T> {
    Found(T),
    Missing,
    EmptyRepository,
}

/// Shared GitHub client. Cheap to clone.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    cache: Arc<dyn ResponseCache>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig, cache: Arc<dyn ResponseCache>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RemoteError::Config("token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// `HostingApi` for one repository.
    pub fn repository(&self, owner: &str, repo: &str) -> GitHubRepository {
        GitHubRepository {
            client: self.clone(),
            base_url: format!("{}/repos/{}/{}", self.api_url, owner, repo),
        }
    }

    /// GET `url`. 404 and 409 (empty repository) are replies, not errors.
    async fn get_bytes(&self, url: &str) -> FetchResult<Reply<Vec<u8>>> {
        debug!(url, "GET");
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::Missing);
        }
        if status == StatusCode::CONFLICT {
            debug!(url, "Repository has no commits");
            return Ok(Reply::EmptyRepository);
        }
        if !status.is_success() {
            return Err(status_error(status, url));
        }
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(Reply::Found(body.to_vec()))
    }

    /// GET and decode JSON, optionally through the response cache. Only
    /// decoded bodies are cached.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, cached: bool) -> FetchResult<Reply<T>> {
        let key = cache_key(url);
        if cached {
            if let Some(bytes) = self.cache.get(&key) {
                return decode(&bytes, url).map(Reply::Found);
            }
        }

        let bytes = match self.get_bytes(url).await? {
            Reply::Found(bytes) => bytes,
            Reply::Missing => return Ok(Reply::Missing),
            Reply::EmptyRepository => return Ok(Reply::EmptyRepository),
        };
        let value = decode(&bytes, url)?;
        if cached {
            self.cache.set(&key, &bytes);
        }
        Ok(Reply::Found(value))
    }

    /// Download and decode the repository zipball.
    pub async fn download_archive(&self, owner: &str, repo: &str) -> FetchResult<RepositoryContent> {
        let url = format!("{}/repos/{}/{}/zipball", self.api_url, owner, repo);
        info!(owner, repo, "Downloading repository archive");
        match self.get_bytes(&url).await? {
            Reply::Found(bytes) => read_zipball(&bytes),
            Reply::Missing => Err(FetchError::NotFound(url)),
            Reply::EmptyRepository => Ok(RepositoryContent::empty()),
        }
    }
}

#[async_trait]
impl RepositoryProvider for GitHubClient {
    fn hosting(&self, owner: &str, repo: &str) -> Arc<dyn HostingApi> {
        Arc::new(self.repository(owner, repo))
    }

    async fn fetch_content(&self, owner: &str, repo: &str) -> FetchResult<RepositoryContent> {
        self.download_archive(owner, repo).await
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], url: &str) -> FetchResult<T> {
    serde_json::from_slice(bytes).map_err(|e| FetchError::Decode(format!("{url}: {e}")))
}

/// One repository on GitHub.
#[derive(Clone)]
pub struct GitHubRepository {
    client: GitHubClient,
    base_url: String,
}

impl GitHubRepository {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list<T: DeserializeOwned>(&self, endpoint: &str) -> FetchResult<Vec<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        match self.client.get_json(&url, true).await? {
            Reply::Found(items) => Ok(items),
            Reply::Missing => Err(FetchError::NotFound(url)),
            // GitHub answers 409 on listings of a repository without commits.
            Reply::EmptyRepository => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HostingApi for GitHubRepository {
    async fn repository_info(&self) -> FetchResult<Option<RepositoryInfo>> {
        let repo: RepoResponse = match self.client.get_json(&self.base_url, false).await? {
            Reply::Found(repo) => repo,
            Reply::Missing => return Ok(None),
            Reply::EmptyRepository => {
                return Err(status_error(StatusCode::CONFLICT, &self.base_url))
            }
        };
        Ok(Some(RepositoryInfo {
            private: repo.private,
            default_branch: repo.default_branch,
            url: repo.html_url,
        }))
    }

    async fn commits(&self, branch: &str) -> FetchResult<Vec<Commit>> {
        let commits: Vec<CommitResponse> = self
            .list(&format!("commits?sha={branch}&per_page={PER_PAGE}"))
            .await?;
        Ok(commits
            .into_iter()
            .map(|c| Commit {
                sha: c.sha,
                message: c.commit.message,
            })
            .collect())
    }

    async fn issues(&self) -> FetchResult<Vec<Issue>> {
        let issues: Vec<IssueResponse> = self
            .list(&format!("issues?state=all&per_page={PER_PAGE}"))
            .await?;
        Ok(issues.into_iter().map(|i| Issue { title: i.title }).collect())
    }

    async fn pull_requests(&self) -> FetchResult<Vec<PullRequest>> {
        let pulls: Vec<PullResponse> = self
            .list(&format!("pulls?state=all&per_page={PER_PAGE}"))
            .await?;
        Ok(pulls
            .into_iter()
            .map(|p| PullRequest {
                merged_at: p.merged_at,
            })
            .collect())
    }
}
