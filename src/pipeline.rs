use chrono::Local;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::api::AttemptsClient;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{AttemptRow, DailySummary, RawAttempt};
use crate::sheets::SheetsPublisher;
use crate::{db, flatten, mailer, metrics, normalize, quality};

/// The analytics ETL job. Stages run strictly in order; the first failing
/// stage aborts the rest and its error reaches the caller.
pub struct Pipeline {
    config: PipelineConfig,
    pool: PgPool,
    attempts: AttemptsClient,
    sheets: SheetsPublisher,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, pool: PgPool) -> Result<Self, PipelineError> {
        let attempts = AttemptsClient::new(
            config.api_url.clone(),
            config.client.clone(),
            config.client_key.clone(),
        )?;
        let sheets =
            SheetsPublisher::new(&config.service_account_file, config.spreadsheet_id.clone())?;

        Ok(Self {
            config,
            pool,
            attempts,
            sheets,
        })
    }

    /// fetch → normalize → persist → quality → aggregate → publish → notify.
    pub async fn run(&self) -> Result<(), PipelineError> {
        let result = self.run_stages().await;
        if let Err(ref err) = result {
            error!(error = %err, "pipeline aborted");
        }
        result
    }

    async fn run_stages(&self) -> Result<(), PipelineError> {
        let raw = self
            .attempts
            .fetch_attempts(self.config.start_date, self.config.end_date)
            .await?;

        let rows = self.normalize(&raw)?;

        db::upsert_attempts(&self.pool, &rows).await?;

        let report = quality::check_rows(&rows, Local::now().naive_local());
        quality::log_report(&report);

        let summary = self.aggregate(&rows);

        self.sheets.publish(&summary).await?;

        mailer::send_notification(&self.config.mail).await?;

        info!("pipeline completed");
        Ok(())
    }

    fn normalize(&self, raw: &[RawAttempt]) -> Result<Vec<AttemptRow>, PipelineError> {
        let (flat, dropped) = flatten::flatten_attempts(raw);
        if dropped > 0 {
            warn!(dropped, "records lost their passback parameters to parse failures");
        }
        normalize::normalize_attempts(&flat)
    }

    fn aggregate(&self, rows: &[AttemptRow]) -> Vec<DailySummary> {
        info!("computing daily metrics");
        let summary = metrics::daily_summary(rows);
        info!(days = summary.len(), "daily metrics computed");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: serde_json::Value) -> RawAttempt {
        fields.as_object().unwrap().clone()
    }

    /// Raw API records all the way through flatten, normalize, and
    /// aggregate, without the I/O stages.
    #[test]
    fn raw_records_become_a_one_day_summary() {
        let raw_records = vec![
            raw(json!({
                "user_id": "u-1",
                "is_correct": 1.0,
                "attempt_type": "submit",
                "created_at": "2024-01-01 09:00:00",
                "passback_params": "{'oauth_consumer_key': 'key-1'}",
            })),
            raw(json!({
                "user_id": "u-2",
                "is_correct": 0.0,
                "attempt_type": "run",
                "created_at": "2024-01-01 14:00:00",
            })),
        ];

        let (flat, dropped) = flatten::flatten_attempts(&raw_records);
        assert_eq!(dropped, 0);
        let rows = normalize::normalize_attempts(&flat).unwrap();
        assert_eq!(rows[0].oauth_consumer_key.as_deref(), Some("key-1"));

        let summary = metrics::daily_summary(&rows);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_attempts, 2);
        assert_eq!(summary[0].successful_attempts, 1);
        assert_eq!(summary[0].unique_users, 2);
    }

    /// A malformed passback literal never stops the run: the record keeps
    /// its top-level fields and flows through normalization.
    #[test]
    fn malformed_passback_flows_through_the_whole_transformation() {
        let raw_records = vec![raw(json!({
            "user_id": "u-1",
            "is_correct": 1.0,
            "attempt_type": "submit",
            "created_at": "2024-01-01 09:00:00",
            "passback_params": "{{{nonsense",
        }))];

        let (flat, dropped) = flatten::flatten_attempts(&raw_records);
        assert_eq!(dropped, 1);
        let rows = normalize::normalize_attempts(&flat).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].oauth_consumer_key, None);

        let summary = metrics::daily_summary(&rows);
        assert_eq!(summary[0].total_attempts, 1);
    }

    /// Out-of-domain content is advisory only; aggregation still happens.
    #[test]
    fn quality_violations_do_not_block_aggregation() {
        let raw_records = vec![raw(json!({
            "user_id": "u-1",
            "is_correct": 1.0,
            "attempt_type": "quiz",
            "created_at": "2024-01-01 09:00:00",
        }))];

        let (flat, _) = flatten::flatten_attempts(&raw_records);
        let rows = normalize::normalize_attempts(&flat).unwrap();

        let report = quality::check_rows(
            &rows,
            chrono::NaiveDate::from_ymd_opt(2100, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(report.invalid_attempt_types, vec![Some("quiz".to_string())]);

        let summary = metrics::daily_summary(&rows);
        assert_eq!(summary[0].total_attempts, 1);
    }
}
