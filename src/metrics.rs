use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::models::{AttemptRow, DailySummary};

/// Header row for the published summary table. Consumers match columns by
/// position, the labels are presentation only.
pub const SUMMARY_HEADER: [&str; 4] =
    ["date", "total_attempts", "successful_attempts", "unique_users"];

#[derive(Default)]
struct DayAccumulator<'a> {
    total: i64,
    successful: i64,
    users: HashSet<&'a str>,
}

/// Computes the per-day summary: total attempts, attempts with
/// `is_correct == 1.0`, and distinct non-null users. One output row per
/// calendar date seen in the batch, in ascending date order; a date with no
/// successful attempts reports 0.
pub fn daily_summary(rows: &[AttemptRow]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for row in rows {
        let day = days.entry(row.created_at.date()).or_default();
        day.total += 1;
        if row.is_correct == Some(1.0) {
            day.successful += 1;
        }
        if let Some(user) = row.user_id.as_deref() {
            day.users.insert(user);
        }
    }

    days.into_iter()
        .map(|(date, day)| DailySummary {
            date,
            total_attempts: day.total,
            successful_attempts: day.successful,
            unique_users: day.users.len() as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn attempt(user: &str, correct: Option<f64>, timestamp: &str) -> AttemptRow {
        AttemptRow {
            id: 0,
            user_id: Some(user.to_string()),
            oauth_consumer_key: None,
            lis_result_sourcedid: None,
            lis_outcome_service_url: None,
            is_correct: correct,
            attempt_type: Some("submit".to_string()),
            created_at: NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[test]
    fn one_day_two_attempts_one_success_two_users() {
        let rows = vec![
            attempt("u-1", Some(1.0), "2024-01-01 09:00:00"),
            attempt("u-2", Some(0.0), "2024-01-01 15:00:00"),
        ];
        let summary = daily_summary(&rows);
        assert_eq!(summary.len(), 1);
        let day = &summary[0];
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(day.total_attempts, 2);
        assert_eq!(day.successful_attempts, 1);
        assert_eq!(day.unique_users, 2);
    }

    #[test]
    fn totals_sum_to_row_count_and_successes_never_exceed_totals() {
        let rows = vec![
            attempt("u-1", Some(1.0), "2024-01-01 09:00:00"),
            attempt("u-1", Some(1.0), "2024-01-01 10:00:00"),
            attempt("u-2", Some(0.0), "2024-01-02 09:00:00"),
            attempt("u-3", None, "2024-01-03 09:00:00"),
        ];
        let summary = daily_summary(&rows);
        let total: i64 = summary.iter().map(|day| day.total_attempts).sum();
        assert_eq!(total, rows.len() as i64);
        for day in &summary {
            assert!(day.successful_attempts <= day.total_attempts);
            assert!(day.unique_users <= day.total_attempts);
        }
    }

    #[test]
    fn day_without_successes_still_appears_with_zero() {
        let rows = vec![
            attempt("u-1", Some(1.0), "2024-01-01 09:00:00"),
            attempt("u-2", Some(0.0), "2024-01-02 09:00:00"),
        ];
        let summary = daily_summary(&rows);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].total_attempts, 1);
        assert_eq!(summary[1].successful_attempts, 0);
        assert_eq!(summary[1].unique_users, 1);
    }

    #[test]
    fn dates_are_ascending() {
        let rows = vec![
            attempt("u-1", None, "2024-02-02 09:00:00"),
            attempt("u-2", None, "2024-01-05 09:00:00"),
            attempt("u-3", None, "2024-01-20 09:00:00"),
        ];
        let summary = daily_summary(&rows);
        let dates: Vec<NaiveDate> = summary.iter().map(|day| day.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn repeated_user_counts_once_per_day() {
        let rows = vec![
            attempt("u-1", None, "2024-01-01 09:00:00"),
            attempt("u-1", None, "2024-01-01 10:00:00"),
            attempt("u-1", None, "2024-01-02 10:00:00"),
        ];
        let summary = daily_summary(&rows);
        assert_eq!(summary[0].unique_users, 1);
        assert_eq!(summary[1].unique_users, 1);
    }

    #[test]
    fn null_users_do_not_count_toward_uniques() {
        let mut anonymous = attempt("u-1", None, "2024-01-01 09:00:00");
        anonymous.user_id = None;
        let summary = daily_summary(&[anonymous]);
        assert_eq!(summary[0].total_attempts, 1);
        assert_eq!(summary[0].unique_users, 0);
    }

    #[test]
    fn is_correct_must_equal_one_exactly() {
        let rows = vec![
            attempt("u-1", Some(0.99), "2024-01-01 09:00:00"),
            attempt("u-2", Some(1.0), "2024-01-01 09:30:00"),
        ];
        let summary = daily_summary(&rows);
        assert_eq!(summary[0].successful_attempts, 1);
    }

    #[test]
    fn empty_batch_yields_empty_summary() {
        assert!(daily_summary(&[]).is_empty());
    }
}
