//! Autocheck core library
//!
//! Batch grading of student repositories: declarative checks, cohort-wide
//! duplicate detection and report generation. Network access lives behind the
//! traits in [`provider`]; concrete clients are in `autocheck-remote`.

pub mod analysis;
pub mod batch;
pub mod content;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod reporting;
pub mod roster;
pub mod spec;
pub mod telemetry;

pub use analysis::{analyze, parse_verdict, PromptContext};
pub use batch::{BatchConfig, BatchCoordinator, BatchOutcome, BatchPhase};
pub use content::RepositoryContent;
pub use duplicates::{DuplicateDetector, DuplicateMatch, DuplicateReport, Signature};
pub use engine::CheckEngine;
pub use error::{
    AnalysisError, AutocheckError, CheckError, ConfigError, FetchError, FetchResult, Result,
};
pub use model::{
    CheckOutcome, CheckStatus, CohortSummary, Commit, Issue, LlmVerdict, PullRequest,
    RepositoryInfo, StudentResult, StudentStatus, TaskAnalysis,
};
pub use pipeline::StudentPipeline;
pub use provider::{cache_key, HostingApi, NoCache, RepositoryProvider, ResponseCache, VerdictProvider};
pub use roster::load_roster;
pub use spec::{Check, CheckKind, CheckSpec, LabSpec};
