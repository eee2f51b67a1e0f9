//! Autocheck - batch grading of student course repositories
//!
//! ## Commands
//!
//! - `run`: evaluate a single student's repository
//! - `batch`: evaluate every student on a roster and detect duplicate submissions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use autocheck_core::reporting::{format_score, BATCH_SUMMARY_MD};
use autocheck_core::telemetry::{init_tracing, level_for};
use autocheck_core::{
    BatchConfig, BatchCoordinator, LabSpec, NoCache, ResponseCache, StudentPipeline, VerdictProvider,
};
use autocheck_remote::{FsResponseCache, GeminiClient, GeminiConfig, GitHubClient, GitHubConfig};

const DEFAULT_CACHE_DIR: &str = ".autocheck_cache";

#[derive(Parser)]
#[command(name = "autocheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch grading of student course repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    github_token: Option<String>,

    /// Gemini API key; enables LLM analysis when set
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Directory for cached GitHub responses
    #[arg(long, env = "AUTOCHECK_CACHE_DIR", global = true, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Do not read or write the response cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one student's repository
    Run {
        /// Student's GitHub login (repository owner)
        #[arg(short, long)]
        student: String,

        /// Lab specification (YAML)
        #[arg(long)]
        spec: PathBuf,

        /// Repository name (default: the spec's repo_name)
        #[arg(short, long)]
        repo: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Evaluate every student on a roster
    Batch {
        /// Roster file (.csv, .json or one login per line)
        #[arg(long)]
        students: PathBuf,

        /// Lab specification (YAML)
        #[arg(long)]
        spec: PathBuf,

        /// Repository name (default: the spec's repo_name)
        #[arg(short, long)]
        repo: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of students evaluated concurrently
        #[arg(short, long, default_value_t = 10)]
        workers: usize,

        /// Skip duplicate detection
        #[arg(long)]
        no_duplicates: bool,

        /// Minimum similarity for a duplicate match, in [0, 1]
        #[arg(long, default_value_t = 0.8)]
        duplicate_threshold: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let github = github_client(&cli)?;
    let verdicts = verdict_provider(&cli)?;

    match cli.command {
        Commands::Run {
            student,
            spec,
            repo,
            output,
        } => cmd_run(github, verdicts, &student, &spec, repo.as_deref(), &output).await,
        Commands::Batch {
            students,
            spec,
            repo,
            output,
            workers,
            no_duplicates,
            duplicate_threshold,
        } => {
            let config = BatchConfig {
                workers,
                detect_duplicates: !no_duplicates,
                duplicate_threshold,
                output_dir: output,
            };
            cmd_batch(github, verdicts, config, &students, &spec, repo.as_deref()).await
        }
    }
}

fn github_client(cli: &Cli) -> Result<Arc<GitHubClient>> {
    let cache: Arc<dyn ResponseCache> = if cli.no_cache {
        Arc::new(NoCache)
    } else {
        Arc::new(
            FsResponseCache::new(&cli.cache_dir)
                .with_context(|| format!("Failed to open cache at {:?}", cli.cache_dir))?,
        )
    };

    let mut config = GitHubConfig::default();
    match &cli.github_token {
        Some(token) => config = config.with_token(token),
        None => warn!("GITHUB_TOKEN is not set; requests are unauthenticated and heavily rate limited"),
    }
    let client = GitHubClient::new(config, cache).context("Failed to create GitHub client")?;
    Ok(Arc::new(client))
}

fn verdict_provider(cli: &Cli) -> Result<Option<Arc<dyn VerdictProvider>>> {
    let Some(key) = &cli.gemini_api_key else {
        return Ok(None);
    };
    let client = GeminiClient::new(GeminiConfig::new(key)).context("Failed to create Gemini client")?;
    info!(models = ?client.models(), "LLM analysis enabled");
    Ok(Some(Arc::new(client)))
}

async fn cmd_run(
    github: Arc<GitHubClient>,
    verdicts: Option<Arc<dyn VerdictProvider>>,
    student: &str,
    spec_path: &Path,
    repo: Option<&str>,
    output: &Path,
) -> Result<()> {
    let mut spec = LabSpec::load(spec_path).context("Failed to load lab specification")?;
    if let Some(name) = repo {
        spec = spec.with_repo_name(name);
    }

    let mut pipeline = StudentPipeline::new(github, Arc::new(spec), output);
    if let Some(verdicts) = verdicts {
        pipeline = pipeline.with_verdicts(verdicts);
    }
    let result = pipeline.run(student).await;

    if result.is_success() {
        println!(
            "{}: {} ({}/{} checks passed)",
            result.student_id,
            format_score(result.score),
            result.passed,
            result.total
        );
        for outcome in &result.outcomes {
            println!("  [{}] {} {}", outcome.status.as_str(), outcome.id, outcome.description);
        }
    } else {
        println!(
            "{}: evaluation failed: {}",
            result.student_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Report: {:?}", output.join(&result.student_id));
    Ok(())
}

async fn cmd_batch(
    github: Arc<GitHubClient>,
    verdicts: Option<Arc<dyn VerdictProvider>>,
    config: BatchConfig,
    students: &Path,
    spec_path: &Path,
    repo: Option<&str>,
) -> Result<()> {
    let output = config.output_dir.clone();
    let mut coordinator = BatchCoordinator::new(github, config);
    if let Some(verdicts) = verdicts {
        coordinator = coordinator.with_verdicts(verdicts);
    }

    let outcome = coordinator
        .run_files(students, spec_path, repo)
        .await
        .context("Batch run failed")?;
    let summary = &outcome.summary;

    println!("Batch complete in {:.1}s", summary.elapsed_seconds);
    println!("  Successful: {}/{}", summary.successful, summary.total_students);
    println!("  Failed:     {}", summary.failed);
    if summary.duplicate_suspects > 0 {
        println!("  Duplicate suspects: {}", summary.duplicate_suspects);
    }
    println!("  Summary: {:?}", output.join(BATCH_SUMMARY_MD));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn batch_defaults() {
        let cli = Cli::parse_from([
            "autocheck",
            "batch",
            "--students",
            "students.csv",
            "--spec",
            "lab.yaml",
        ]);
        match cli.command {
            Commands::Batch {
                workers,
                no_duplicates,
                duplicate_threshold,
                output,
                repo,
                ..
            } => {
                assert_eq!(workers, 10);
                assert!(!no_duplicates);
                assert_eq!(duplicate_threshold, 0.8);
                assert_eq!(output, PathBuf::from("results"));
                assert!(repo.is_none());
            }
            Commands::Run { .. } => panic!("expected batch"),
        }
    }

    #[test]
    fn run_takes_student_and_repo() {
        let cli = Cli::parse_from([
            "autocheck",
            "--no-cache",
            "run",
            "--student",
            "alice",
            "--spec",
            "lab.yaml",
            "--repo",
            "lab-02",
        ]);
        assert!(cli.no_cache);
        match cli.command {
            Commands::Run { student, repo, .. } => {
                assert_eq!(student, "alice");
                assert_eq!(repo.as_deref(), Some("lab-02"));
            }
            Commands::Batch { .. } => panic!("expected run"),
        }
    }
}
