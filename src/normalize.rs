use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::PipelineError;
use crate::models::{AttemptRow, FlatAttempt};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Shapes flattened attempts into the fixed seven-column layout of the
/// `user_config` table. Fields are pulled by name, so extra fields and field
/// order in the source are irrelevant. `id` is the zero-based batch position.
///
/// Fails if any record lacks a parseable `created_at`; every other field is
/// nullable and carried through as-is.
pub fn normalize_attempts(flat: &[FlatAttempt]) -> Result<Vec<AttemptRow>, PipelineError> {
    let mut rows = Vec::with_capacity(flat.len());

    for (index, attempt) in flat.iter().enumerate() {
        rows.push(AttemptRow {
            id: index as i32,
            user_id: opt_string(attempt, "user_id"),
            oauth_consumer_key: opt_string(attempt, "oauth_consumer_key"),
            lis_result_sourcedid: opt_string(attempt, "lis_result_sourcedid"),
            lis_outcome_service_url: opt_string(attempt, "lis_outcome_service_url"),
            is_correct: opt_f64(attempt, "is_correct"),
            attempt_type: opt_string(attempt, "attempt_type"),
            created_at: parse_created_at(attempt, index)?,
        });
    }

    Ok(rows)
}

fn opt_string(attempt: &FlatAttempt, field: &str) -> Option<String> {
    match attempt.get(field) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn opt_f64(attempt: &FlatAttempt, field: &str) -> Option<f64> {
    match attempt.get(field) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.parse().ok(),
        _ => None,
    }
}

fn parse_created_at(attempt: &FlatAttempt, index: usize) -> Result<NaiveDateTime, PipelineError> {
    let text = match attempt.get("created_at") {
        Some(Value::String(text)) => text,
        Some(other) => {
            return Err(PipelineError::Schema(format!(
                "record {index}: created_at is not a timestamp string: {other}"
            )))
        }
        None => {
            return Err(PipelineError::Schema(format!(
                "record {index}: created_at is missing"
            )))
        }
    };

    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed);
        }
    }
    // date-only input has no time component for parse_from_str
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(PipelineError::Schema(format!(
        "record {index}: cannot parse created_at {text:?}"
    )))
}
