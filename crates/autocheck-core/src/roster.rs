//! Roster loading.
//!
//! Supported formats, chosen by extension:
//! - `.csv`: header row; the `student_alias` column, else the first column
//! - `.json`: an array of strings
//! - anything else: one student id per line
//!
//! Entries are not deduplicated; a repeated id is graded once per occurrence.

use std::path::Path;
use tracing::info;

use crate::error::ConfigError;

const ALIAS_COLUMN: &str = "student_alias";

pub fn load_roster(path: &Path) -> Result<Vec<String>, ConfigError> {
    let origin = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::RosterNotFound(origin));
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: origin.clone(),
        reason: e.to_string(),
    })?;

    let students = match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => parse_csv(&text, &origin)?,
        Some("json") => parse_json(&text, &origin)?,
        _ => parse_lines(&text),
    };

    if students.is_empty() {
        return Err(ConfigError::EmptyRoster(origin));
    }
    info!(roster = %origin, students = students.len(), "Loaded roster");
    Ok(students)
}

pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_csv(text: &str, origin: &str) -> Result<Vec<String>, ConfigError> {
    let parse_error = |e: csv::Error| ConfigError::Parse {
        path: origin.to_string(),
        reason: e.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let column = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .position(|name| name == ALIAS_COLUMN)
        .unwrap_or(0);

    let mut students = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_error)?;
        if let Some(alias) = record.get(column).filter(|alias| !alias.is_empty()) {
            students.push(alias.to_string());
        }
    }
    Ok(students)
}

pub fn parse_json(text: &str, origin: &str) -> Result<Vec<String>, ConfigError> {
    let students: Vec<String> = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    Ok(students
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
