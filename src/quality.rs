use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::models::AttemptRow;

const VALID_ATTEMPT_TYPES: [&str; 3] = ["submit", "run", "test"];

/// Outcome of the advisory data-quality battery. Produced for every batch;
/// nothing in here ever blocks the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub row_count: usize,
    pub duplicate_rows: usize,
    pub ids_unique: bool,
    /// Distinct out-of-domain attempt types; `None` marks a missing value.
    pub invalid_attempt_types: Vec<Option<String>>,
    /// Distinct non-null is_correct values outside {0.0, 1.0}.
    pub invalid_is_correct: Vec<f64>,
    /// Max created_at, when it lies after the check time.
    pub future_created_at: Option<NaiveDateTime>,
}

/// Runs the full check battery. Read-only and infallible: content problems
/// land in the report, they are never errors.
pub fn check_rows(rows: &[AttemptRow], now: NaiveDateTime) -> QualityReport {
    let mut seen_rows = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut duplicate_rows = 0usize;
    let mut ids_unique = true;
    let mut bad_types: Vec<Option<String>> = Vec::new();
    let mut bad_correct: Vec<f64> = Vec::new();
    let mut max_created_at: Option<NaiveDateTime> = None;

    for row in rows {
        let key = (
            row.id,
            &row.user_id,
            &row.oauth_consumer_key,
            &row.lis_result_sourcedid,
            &row.lis_outcome_service_url,
            row.is_correct.map(f64::to_bits),
            &row.attempt_type,
            row.created_at,
        );
        if !seen_rows.insert(key) {
            duplicate_rows += 1;
        }
        if !seen_ids.insert(row.id) {
            ids_unique = false;
        }

        let type_ok = row
            .attempt_type
            .as_deref()
            .is_some_and(|value| VALID_ATTEMPT_TYPES.contains(&value));
        if !type_ok && !bad_types.contains(&row.attempt_type) {
            bad_types.push(row.attempt_type.clone());
        }

        if let Some(value) = row.is_correct {
            if value != 0.0 && value != 1.0 && !bad_correct.iter().any(|seen| seen == &value) {
                bad_correct.push(value);
            }
        }

        if max_created_at.is_none_or(|max| row.created_at > max) {
            max_created_at = Some(row.created_at);
        }
    }

    QualityReport {
        row_count: rows.len(),
        duplicate_rows,
        ids_unique,
        invalid_attempt_types: bad_types,
        invalid_is_correct: bad_correct,
        future_created_at: max_created_at.filter(|max| *max > now),
    }
}

/// Emits the report through the log. Violations are warnings, everything
/// else is informational.
pub fn log_report(report: &QualityReport) {
    info!(rows = report.row_count, "quality: batch size");
    info!(duplicates = report.duplicate_rows, "quality: exact duplicate rows");
    info!(unique = report.ids_unique, "quality: id uniqueness");

    if report.invalid_attempt_types.is_empty() {
        info!("quality: all attempt_type values are in the expected domain");
    } else {
        warn!(
            values = ?report.invalid_attempt_types,
            "quality: attempt_type values outside {{submit, run, test}}"
        );
    }

    if report.invalid_is_correct.is_empty() {
        info!("quality: all is_correct values are in the expected domain");
    } else {
        warn!(
            values = ?report.invalid_is_correct,
            "quality: is_correct values outside {{0.0, 1.0}}"
        );
    }

    match report.future_created_at {
        Some(max) => warn!(max = %max, "quality: created_at lies in the future"),
        None => info!("quality: created_at values do not exceed the current time"),
    }
}
