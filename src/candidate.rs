//! Candidate records as served to the recruiter dashboard.
//!
//! The upstream workflow returns loosely typed JSON. Every field goes through its own
//! coerce-or-default function so a malformed record degrades to empty values instead of
//! failing the whole response.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub email: String,
    pub job_title: String,
    pub drive_url: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub skills: Vec<String>,
    pub years_experience: f64,
    pub credibility_score: f64,
    pub ats_score: f64,
    pub created_at: String,
}

/// Coerce an upstream payload into candidates. Anything but an array yields no records.
pub fn normalize(raw: &Value) -> Vec<Candidate> {
    match raw.as_array() {
        Some(records) => records.iter().map(normalize_record).collect(),
        None => Vec::new(),
    }
}

static NULL: Value = Value::Null;

fn field<'a>(record: &'a Value, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

pub fn normalize_record(record: &Value) -> Candidate {
    let highlights_source = field(record, "highlights");
    let skills_source = match field(record, "skills") {
        Value::Null => highlights_source,
        skills => skills,
    };

    Candidate {
        id: coerce_string(field(record, "id")),
        name: coerce_string(field(record, "name")),
        email: coerce_string(field(record, "email")),
        job_title: coerce_string(field(record, "jobTitle")),
        drive_url: coerce_string(field(record, "driveUrl")),
        summary: coerce_string(field(record, "summary")),
        highlights: coerce_list(highlights_source),
        skills: coerce_list(skills_source),
        years_experience: coerce_non_negative(field(record, "yearsExperience")),
        credibility_score: coerce_score(field(record, "credibilityScore")),
        ats_score: coerce_score(field(record, "atsScore")),
        created_at: coerce_timestamp(field(record, "createdAt")),
    }
}

/// Strings pass through, numbers and booleans are rendered, everything else is empty.
pub fn coerce_string(value: &Value) -> String {
    scalar_text(value).unwrap_or_default()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accepts an array or a comma separated string; entries are trimmed, empties dropped.
pub fn coerce_list(value: &Value) -> Vec<String> {
    let entries: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// JSON numbers and numeric strings; non-finite or non-numeric input is `None`.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

pub fn coerce_non_negative(value: &Value) -> f64 {
    coerce_number(value).map(|n| n.max(0.0)).unwrap_or(0.0)
}

pub fn coerce_score(value: &Value) -> f64 {
    coerce_number(value).map(|n| n.clamp(0.0, 100.0)).unwrap_or(0.0)
}

/// Keeps a non-empty upstream timestamp verbatim, otherwise stamps the current time.
pub fn coerce_timestamp(value: &Value) -> String {
    match scalar_text(value) {
        Some(text) if !text.trim().is_empty() => text,
        _ => now_iso(),
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
