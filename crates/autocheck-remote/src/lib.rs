//! Network collaborators for autocheck.
//!
//! - [`GitHubClient`]: `RepositoryProvider` over the GitHub REST API
//! - [`GeminiClient`]: `VerdictProvider` over Gemini `generateContent`
//! - [`FsResponseCache`]: on-disk `ResponseCache`

pub mod archive;
pub mod cache;
pub mod error;
pub mod gemini;
pub mod github;

pub use archive::read_zipball;
pub use cache::FsResponseCache;
pub use error::{RemoteError, Result};
pub use gemini::{GeminiClient, GeminiConfig, DEFAULT_MODELS};
pub use github::{GitHubClient, GitHubConfig, GitHubRepository};
