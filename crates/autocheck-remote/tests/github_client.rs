//! Integration tests for the GitHub client against a canned local HTTP server.

use autocheck_core::fakes::MemoryResponseCache;
use autocheck_core::{
    CheckEngine, CheckSpec, CheckStatus, FetchError, HostingApi, RepositoryContent,
    RepositoryProvider,
};
use autocheck_remote::{GitHubClient, GitHubConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned response: status line code and body.
type Routes = HashMap<&'static str, (u16, Vec<u8>)>;

/// Serve `routes` (keyed by request path including query) until the test ends.
/// Returns the base URL and a request counter.
async fn serve(routes: Routes) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = routes
                    .get(path.as_str())
                    .cloned()
                    .unwrap_or((404, br#"{"message": "Not Found"}"#.to_vec()));
                let head = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), hits)
}

fn client(base: &str, cache: Arc<MemoryResponseCache>) -> GitHubClient {
    GitHubClient::new(
        GitHubConfig::default().with_token("test").with_api_url(base),
        cache,
    )
    .unwrap()
}

fn json(body: &str) -> (u16, Vec<u8>) {
    (200, body.as_bytes().to_vec())
}

#[tokio::test]
async fn test_repository_info_and_missing_repo() {
    let mut routes = Routes::new();
    routes.insert(
        "/repos/alice/lab",
        json(r#"{"private": false, "default_branch": "master", "html_url": "https://github.com/alice/lab"}"#),
    );
    let (base, _) = serve(routes).await;
    let client = client(&base, Arc::new(MemoryResponseCache::new()));

    let info = client.repository("alice", "lab").repository_info().await.unwrap().unwrap();
    assert_eq!(info.default_branch, "master");
    assert_eq!(info.url.as_deref(), Some("https://github.com/alice/lab"));

    let missing = client.repository("ghost", "lab").repository_info().await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_listings_are_cached_and_info_is_not() {
    let mut routes = Routes::new();
    routes.insert("/repos/alice/lab", json(r#"{"private": false, "default_branch": "main"}"#));
    routes.insert(
        "/repos/alice/lab/issues?state=all&per_page=100",
        json(r#"[{"title": "[Task] Setup"}]"#),
    );
    let (base, hits) = serve(routes).await;
    let cache = Arc::new(MemoryResponseCache::new());
    let client = client(&base, cache.clone());
    let repo = client.repository("alice", "lab");

    repo.repository_info().await.unwrap();
    repo.repository_info().await.unwrap();
    let first = repo.issues().await.unwrap();
    let second = repo.issues().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].title, "[Task] Setup");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_status_mapping_for_listings() {
    let mut routes = Routes::new();
    routes.insert(
        "/repos/alice/lab/pulls?state=all&per_page=100",
        (403, br#"{"message": "rate limited"}"#.to_vec()),
    );
    routes.insert(
        "/repos/alice/lab/commits?sha=main&per_page=100",
        (500, b"oops".to_vec()),
    );
    routes.insert(
        "/repos/alice/lab/issues?state=all&per_page=100",
        json("{not json"),
    );
    let (base, _) = serve(routes).await;
    let cache = Arc::new(MemoryResponseCache::new());
    let client = client(&base, cache.clone());
    let repo = client.repository("alice", "lab");

    assert!(matches!(repo.pull_requests().await, Err(FetchError::AccessDenied(_))));
    assert!(matches!(repo.commits("main").await, Err(FetchError::Transient(_))));
    assert!(matches!(repo.issues().await, Err(FetchError::Decode(_))));
    assert!(cache.is_empty(), "failed responses are never cached");

    let ghost = client.repository("ghost", "lab");
    assert!(matches!(ghost.issues().await, Err(FetchError::NotFound(_))));
}

/// Test: GitHub answers 409 on the commit listing of an empty repository;
/// the commit check fails instead of erroring, and nothing is cached.
#[tokio::test]
async fn test_empty_repository_fails_commit_check() {
    let conflict = br#"{"message": "Git Repository is empty."}"#.to_vec();
    let mut routes = Routes::new();
    routes.insert("/repos/alice/lab", json(r#"{"private": false, "default_branch": "main"}"#));
    routes.insert("/repos/alice/lab/commits?sha=main&per_page=100", (409, conflict.clone()));
    routes.insert("/repos/alice/lab/zipball", (409, conflict));
    let (base, _) = serve(routes).await;
    let cache = Arc::new(MemoryResponseCache::new());
    let client = client(&base, cache.clone());
    let repo = client.repository("alice", "lab");

    assert!(repo.commits("main").await.unwrap().is_empty());
    assert!(cache.is_empty(), "empty-repository replies are not cached");
    assert!(client.fetch_content("alice", "lab").await.unwrap().is_empty());

    let content = RepositoryContent::empty();
    let mut engine = CheckEngine::new(&repo, &content);
    let check = CheckSpec::new("commits", "commit_message_regex", serde_json::json!({ "pattern": "feat" }));
    let outcome = engine.run_check(&check).await;
    assert_eq!(outcome.status, CheckStatus::Fail);
    assert!(outcome.details.is_none());
}

#[tokio::test]
async fn test_commits_and_merged_pulls_decoded() {
    let mut routes = Routes::new();
    routes.insert(
        "/repos/alice/lab/commits?sha=main&per_page=100",
        json(r#"[{"sha": "a1", "commit": {"message": "feat: one"}}, {"sha": "b2", "commit": {"message": "fix: two"}}]"#),
    );
    routes.insert(
        "/repos/alice/lab/pulls?state=all&per_page=100",
        json(r#"[{"merged_at": "2025-02-01T12:00:00Z"}, {"merged_at": null}]"#),
    );
    let (base, _) = serve(routes).await;
    let client = client(&base, Arc::new(MemoryResponseCache::new()));
    let repo = client.hosting("alice", "lab");

    let commits = repo.commits("main").await.unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[1].message, "fix: two");

    let pulls = repo.pull_requests().await.unwrap();
    assert_eq!(pulls.iter().filter(|p| p.merged_at.is_some()).count(), 1);
}

#[tokio::test]
async fn test_archive_download() {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("alice-lab-123/README.md", options).unwrap();
    writer.write_all(b"# Lab").unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let mut routes = Routes::new();
    routes.insert("/repos/alice/lab/zipball", (200, archive));
    let (base, _) = serve(routes).await;
    let client = client(&base, Arc::new(MemoryResponseCache::new()));

    let content = client.fetch_content("alice", "lab").await.unwrap();
    assert_eq!(content.read_file("README.md").as_deref(), Some("# Lab"));

    let err = client.fetch_content("ghost", "lab").await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
}
