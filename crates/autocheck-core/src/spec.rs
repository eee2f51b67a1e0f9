//! Lab specification: the ordered list of checks a batch grades against.
//!
//! Specs are YAML documents:
//!
//! ```yaml
//! id: lab-01
//! repo_name: lab-01-market-product-and-git
//! checks:
//!   - id: readme
//!     type: file_exists
//!     params: { path: README.md }
//!     description: README is present
//! ```

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{CheckError, ConfigError};

/// One declarative check as written in the spec file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: String,
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub description: String,
}

impl CheckSpec {
    pub fn new(id: impl Into<String>, check_type: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            check_type: check_type.into(),
            params,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Text shown in reports: the description, or the id when none is given.
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.id
        } else {
            &self.description
        }
    }
}

fn params_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Recognized check types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    RepoExists,
    FileExists,
    CommitMessageRegex,
    IssuesCount,
    PrMergedCount,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::RepoExists,
        CheckKind::FileExists,
        CheckKind::CommitMessageRegex,
        CheckKind::IssuesCount,
        CheckKind::PrMergedCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::RepoExists => "repo_exists",
            CheckKind::FileExists => "file_exists",
            CheckKind::CommitMessageRegex => "commit_message_regex",
            CheckKind::IssuesCount => "issues_count",
            CheckKind::PrMergedCount => "pr_merged_count",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A check with its parameters decoded and its patterns compiled.
#[derive(Debug, Clone)]
pub enum Check {
    RepoExists,
    FileExists { path: String },
    CommitMessageRegex { pattern: Regex },
    IssuesCount { title_regex: Regex, min_count: i64 },
    PrMergedCount { min_count: i64 },
}

impl Check {
    /// Decode `params` for `kind`. Fails on missing or mistyped parameters.
    pub fn decode(kind: CheckKind, params: &Map<String, Value>) -> Result<Self, CheckError> {
        match kind {
            CheckKind::RepoExists => Ok(Check::RepoExists),
            CheckKind::FileExists => Ok(Check::FileExists {
                path: string_param(params, "path")?.to_string(),
            }),
            CheckKind::CommitMessageRegex => Ok(Check::CommitMessageRegex {
                pattern: prefix_regex(string_param(params, "pattern")?)?,
            }),
            CheckKind::IssuesCount => Ok(Check::IssuesCount {
                title_regex: prefix_regex(string_param(params, "title_regex")?)?,
                min_count: int_param(params, "min_count")?,
            }),
            CheckKind::PrMergedCount => Ok(Check::PrMergedCount {
                min_count: int_param(params, "min_count")?,
            }),
        }
    }
}

fn string_param<'a>(params: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, CheckError> {
    match params.get(name) {
        None | Some(Value::Null) => Err(CheckError::MissingParam(name)),
        Some(value) => value.as_str().ok_or(CheckError::InvalidParam {
            name,
            expected: "a string",
        }),
    }
}

fn int_param(params: &Map<String, Value>, name: &'static str) -> Result<i64, CheckError> {
    match params.get(name) {
        None | Some(Value::Null) => Err(CheckError::MissingParam(name)),
        Some(value) => value.as_i64().ok_or(CheckError::InvalidParam {
            name,
            expected: "an integer",
        }),
    }
}

/// Compile `pattern` so it only matches at the start of the haystack.
pub fn prefix_regex(pattern: &str) -> Result<Regex, CheckError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| CheckError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// A lab: the repository naming convention plus its ordered checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabSpec {
    pub id: String,
    pub repo_name: String,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

impl LabSpec {
    /// Parse and validate a YAML document. `origin` is only used in errors.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        let spec: LabSpec = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a spec file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::SpecNotFound(origin));
        }
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: origin.clone(),
            reason: e.to_string(),
        })?;
        let spec = Self::from_yaml_str(&yaml, &origin)?;
        info!(spec = %spec.id, checks = spec.checks.len(), "Loaded lab specification");
        Ok(spec)
    }

    /// Reject empty or duplicate ids and unknown check types before any fetch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.id.trim().is_empty() {
                return Err(ConfigError::EmptyCheckId);
            }
            if !seen.insert(check.id.as_str()) {
                return Err(ConfigError::DuplicateCheckId(check.id.clone()));
            }
            if CheckKind::from_name(&check.check_type).is_none() {
                return Err(ConfigError::UnknownCheckType {
                    id: check.id.clone(),
                    check_type: check.check_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Replace the repository name convention (e.g. from a CLI flag).
    pub fn with_repo_name(mut self, repo_name: impl Into<String>) -> Self {
        self.repo_name = repo_name.into();
        self
    }
}
