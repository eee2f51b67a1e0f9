//! Cohort-wide duplicate detection.
//!
//! Two-phase protocol: every pipeline registers its student's [`Signature`]
//! (concurrently, one key per student), then the batch coordinator calls
//! [`DuplicateDetector::report`] once after all pipelines have finished.
//!
//! Only exact content matches count. Files that differ in any byte contribute
//! nothing to similarity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

use crate::content::RepositoryContent;

/// Default minimum similarity for a pair to be reported.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Directory names whose contents never take part in comparison.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
];

/// Binary, image and archive extensions, compared case-insensitively.
pub const IGNORED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".pdf", ".zip", ".exe"];

/// Whether `path` is excluded from signatures.
pub fn is_ignored(path: &str) -> bool {
    let mut components: Vec<&str> = path.split('/').collect();
    components.pop();
    if components.iter().any(|dir| IGNORED_DIRS.contains(dir)) {
        return true;
    }
    let lower = path.to_lowercase();
    IGNORED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Path → SHA-256 hex digest of the file content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    files: BTreeMap<String, String>,
}

impl Signature {
    /// Hash every non-ignored, non-empty UTF-8 text file of the snapshot.
    pub fn from_content(content: &RepositoryContent) -> Self {
        let files = content
            .list_all_files()
            .into_iter()
            .filter(|path| !is_ignored(path))
            .filter_map(|path| {
                let text = content.read_file(&path)?;
                if text.is_empty() {
                    return None;
                }
                let digest = hex::encode(Sha256::digest(text.as_bytes()));
                Some((path, digest))
            })
            .collect();
        Self { files }
    }

    /// Build from precomputed digests.
    pub fn from_digests<I, P, D>(digests: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: Into<String>,
    {
        Self {
            files: digests
                .into_iter()
                .map(|(path, digest)| (path.into(), digest.into()))
                .collect(),
        }
    }

    pub fn digest(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One directed suspicion: the reported student shares identical files with
/// `suspect_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub suspect_id: String,
    pub similarity_score: f64,
    /// Paths present in both repositories with identical content, sorted.
    pub identical_files: Vec<String>,
    #[serde(rename = "common_files_count")]
    pub common_files: usize,
    pub total_files_student: usize,
    pub total_files_other: usize,
}

/// Flagged student → matches sorted by descending similarity. Students without
/// a match are absent.
pub type DuplicateReport = BTreeMap<String, Vec<DuplicateMatch>>;

/// Compare `student` against `other`. `None` when they share no identical file.
pub fn compare(student: &Signature, other: &Signature, suspect_id: &str) -> Option<DuplicateMatch> {
    let mut common_files = 0;
    let mut identical_files = Vec::new();
    for (path, digest) in &student.files {
        if let Some(other_digest) = other.files.get(path) {
            common_files += 1;
            if digest == other_digest {
                identical_files.push(path.clone());
            }
        }
    }
    if identical_files.is_empty() {
        return None;
    }

    let largest = student.len().max(other.len());
    Some(DuplicateMatch {
        suspect_id: suspect_id.to_string(),
        similarity_score: identical_files.len() as f64 / largest as f64,
        identical_files,
        common_files,
        total_files_student: student.len(),
        total_files_other: other.len(),
    })
}

/// Shared signature index for one batch run.
#[derive(Debug)]
pub struct DuplicateDetector {
    threshold: f64,
    signatures: Mutex<HashMap<String, Signature>>,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            signatures: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Build and store the signature for `student`. Re-registering replaces
    /// the previous signature.
    pub fn register(&self, student: &str, content: &RepositoryContent) -> usize {
        let signature = Signature::from_content(content);
        let files = signature.len();
        self.register_signature(student, signature);
        files
    }

    pub fn register_signature(&self, student: &str, signature: Signature) {
        debug!(student = %student, files = signature.len(), "Registered signature");
        let mut signatures = self.signatures.lock().unwrap_or_else(|e| e.into_inner());
        signatures.insert(student.to_string(), signature);
    }

    /// Number of registered students.
    pub fn len(&self) -> usize {
        self.signatures.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairwise comparison over every registered signature.
    ///
    /// Call only after all registrations have completed; an earlier call sees a
    /// partial cohort.
    pub fn report(&self) -> DuplicateReport {
        let signatures = self.signatures.lock().unwrap_or_else(|e| e.into_inner());
        let mut report = DuplicateReport::new();

        for (student, signature) in signatures.iter() {
            let mut matches: Vec<DuplicateMatch> = signatures
                .iter()
                .filter(|(other_id, _)| *other_id != student)
                .filter_map(|(other_id, other)| compare(signature, other, other_id))
                .filter(|m| m.similarity_score >= self.threshold)
                .collect();
            if matches.is_empty() {
                continue;
            }
            matches.sort_by(|a, b| {
                b.similarity_score
                    .partial_cmp(&a.similarity_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.suspect_id.cmp(&b.suspect_id))
            });
            report.insert(student.clone(), matches);
        }
        report
    }
}
