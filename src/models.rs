use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// One attempt record exactly as the grader API returned it. The
/// `passback_params` field, when present, holds a textually serialized
/// mapping literal rather than nested JSON.
pub type RawAttempt = Map<String, Value>;

/// A raw attempt with its serialized passback parameters parsed and
/// merged into the top level.
pub type FlatAttempt = Map<String, Value>;

/// One normalized attempt, shaped for the `user_config` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRow {
    /// Zero-based position in the normalized batch. Dense and unique
    /// within a run, but not stable across runs.
    pub id: i32,
    pub user_id: Option<String>,
    pub oauth_consumer_key: Option<String>,
    pub lis_result_sourcedid: Option<String>,
    pub lis_outcome_service_url: Option<String>,
    pub is_correct: Option<f64>,
    pub attempt_type: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Per-day attempt metrics published to the summary sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_attempts: i64,
    pub successful_attempts: i64,
    pub unique_users: i64,
}

/// One forecast sample keyed by calendar date and time of day, ready
/// for the two-panel chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub seconds_since_midnight: u32,
    pub temp_c: f64,
    pub wind_speed_ms: f64,
}
