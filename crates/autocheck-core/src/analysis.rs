//! Qualitative analysis via a language model.
//!
//! Builds the reviewer prompt from the README, the commit history and the
//! lab's task list, and parses the model's JSON answer into an [`LlmVerdict`].
//! Failures never propagate: [`analyze`] substitutes the sentinel verdict.

use tracing::{debug, warn};

use crate::error::{bounded, AnalysisError, ANALYSIS_ERROR_LIMIT};
use crate::model::LlmVerdict;
use crate::provider::VerdictProvider;

const README_MISSING: &str = "README.md not found.";
const COMMITS_MISSING: &str = "No commits found.";

/// Material the model reviews.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    pub readme: Option<String>,
    pub commit_messages: Vec<String>,
    pub tasks: Vec<String>,
}

impl PromptContext {
    pub fn render(&self) -> String {
        let readme = self.readme.as_deref().unwrap_or(README_MISSING);
        let commits = if self.commit_messages.is_empty() {
            COMMITS_MISSING.to_string()
        } else {
            self.commit_messages.join("\n")
        };
        let tasks = if self.tasks.is_empty() {
            "- (no tasks listed)".to_string()
        } else {
            self.tasks
                .iter()
                .enumerate()
                .map(|(i, task)| format!("{}. {}", i + 1, task))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are an experienced teaching assistant reviewing a student's lab repository.
Assess how well the submission covers the tasks below, judging only from the material provided.

Tasks:
{tasks}

README.md content:
---
{readme}
---

Commit history (newest first):
---
{commits}
---

Answer with a single JSON object and nothing else, using these keys:
- "verdict": one short sentence with your overall assessment
- "reasons": list of 2-4 short justifications
- "quotes": list of 2-3 telling quotes from the README or the commits
- "task_analysis": one entry per task with "task_number", "task_name", "result" ("done", "partial" or "missing"), "argumentation", "quotes" and "link"
"#
        )
    }
}

/// Strip Markdown code fences and parse the verdict object.
pub fn parse_verdict(text: &str) -> Result<LlmVerdict, AnalysisError> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(AnalysisError::Parse("empty response".to_string()));
    }
    serde_json::from_str(cleaned).map_err(|e| AnalysisError::Parse(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Ask `provider` for a verdict; any failure yields the sentinel verdict.
pub async fn analyze(provider: &dyn VerdictProvider, context: &PromptContext) -> LlmVerdict {
    let prompt = context.render();
    match provider.request_verdict(&prompt).await {
        Ok(verdict) => {
            debug!(verdict = %verdict.verdict, "LLM analysis complete");
            verdict
        }
        Err(e) => {
            warn!(error = %e, "LLM analysis failed");
            LlmVerdict::analysis_failed(bounded(&e.to_string(), ANALYSIS_ERROR_LIMIT))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedVerdicts;

    #[test]
    fn prompt_includes_material() {
        let context = PromptContext {
            readme: Some("# Market product".to_string()),
            commit_messages: vec!["feat: add persona".to_string()],
            tasks: vec!["README is present".to_string(), "PR merged".to_string()],
        };
        let prompt = context.render();
        assert!(prompt.contains("# Market product"));
        assert!(prompt.contains("feat: add persona"));
        assert!(prompt.contains("1. README is present"));
        assert!(prompt.contains("2. PR merged"));
    }

    #[test]
    fn prompt_marks_missing_material() {
        let prompt = PromptContext::default().render();
        assert!(prompt.contains(README_MISSING));
        assert!(prompt.contains(COMMITS_MISSING));
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"verdict\": \"solid\", \"reasons\": [\"r\"], \"quotes\": []}\n```";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.verdict, "solid");
        assert_eq!(verdict.reasons, vec!["r".to_string()]);
    }

    #[test]
    fn parses_bare_json_with_task_analysis() {
        let text = r#"{"verdict": "ok", "task_analysis": [{"task_number": 1, "task_name": "Setup", "result": "done", "quotes": ["x"]}]}"#;
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.task_analysis.len(), 1);
        assert_eq!(verdict.task_analysis[0].task_name.as_deref(), Some("Setup"));
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn rejects_prose() {
        let err = parse_verdict("The student did well.").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        assert!(parse_verdict("```json\n```").is_err());
    }

    #[tokio::test]
    async fn failure_becomes_bounded_sentinel() {
        let provider = ScriptedVerdicts::failing(&"quota ".repeat(50));
        let verdict = analyze(&provider, &PromptContext::default()).await;
        assert!(verdict.is_failure());
        assert!(verdict.reasons[0].chars().count() <= ANALYSIS_ERROR_LIMIT + 3);
    }

    #[tokio::test]
    async fn success_passes_verdict_through() {
        let expected = LlmVerdict {
            verdict: "good".to_string(),
            ..LlmVerdict::default()
        };
        let provider = ScriptedVerdicts::returning(expected.clone());
        let verdict = analyze(&provider, &PromptContext::default()).await;
        assert_eq!(verdict, expected);
        assert_eq!(provider.prompts().len(), 1);
    }
}
